mod common;
mod voting;
