use crate::infra::memory_poll_service;
use clap::Args;
use live_poll::error::AppError;
use live_poll::polls::{
    CreatePollRequest, OptionInput, PollError, PollSettings, VoteStatusQuery, VoteSubmission,
};
use serde_json::json;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Poll question shown to participants
    #[arg(long, default_value = "Which talk should open the next meetup?")]
    pub(crate) title: String,
    /// Comma-separated option texts (at least two)
    #[arg(
        long,
        value_delimiter = ',',
        default_values = ["Rust in production", "Async deep dive", "Testing strategies"]
    )]
    pub(crate) options: Vec<String>,
    /// Number of distinct participants that vote
    #[arg(long, default_value_t = 7)]
    pub(crate) voters: usize,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        title,
        options,
        voters,
    } = args;

    let service = memory_poll_service(PollSettings::default());
    let view = service.create_poll(CreatePollRequest {
        title,
        description: Some("Seeded by the live poll demo".to_string()),
        host_name: Some("Demo host".to_string()),
        event_name: None,
        options: options.into_iter().map(OptionInput::Text).collect(),
    })?;
    let poll_id = view.poll.id.clone();

    println!("Live poll demo");
    println!("Poll {} created, share link: {}", poll_id, view.share_url);

    let option_count = view.poll.options.len();
    for voter in 0..voters {
        // Skews the tally toward the first options so the ranking is visible.
        let option = &view.poll.options[(voter * voter) % option_count];
        let receipt = service.cast_vote(VoteSubmission {
            poll_id: poll_id.0.clone(),
            option_id: option.id.clone(),
            user_id: None,
            device_id: Some(format!("demo-device-{voter}")),
            address: "127.0.0.1".to_string(),
            user_agent: Some("live-poll-demo".to_string()),
        })?;
        println!(
            "  device {voter} voted for '{}' ({} votes for that option)",
            option.text, receipt.vote_count
        );
    }

    if voters > 0 {
        let repeat = service.cast_vote(VoteSubmission {
            poll_id: poll_id.0.clone(),
            option_id: view.poll.options[0].id.clone(),
            user_id: None,
            device_id: Some("demo-device-0".to_string()),
            address: "127.0.0.1".to_string(),
            user_agent: None,
        });
        match repeat {
            Err(PollError::Conflict) => println!("  device 0 tried again and was rejected"),
            Err(other) => return Err(other.into()),
            Ok(_) => println!("  device 0 voted twice; duplicate suppression did not apply"),
        }

        let status = service.vote_status(
            &VoteStatusQuery {
                poll_id: poll_id.0.clone(),
                user_id: None,
                device_id: Some("demo-device-0".to_string()),
            },
            "127.0.0.1",
        )?;
        println!("  device 0 status: hasVoted={}", status.has_voted);
    }

    let results = service.results(&poll_id)?;
    let analytics = service.analytics(&poll_id)?;
    let report = json!({ "results": results, "analytics": analytics });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
