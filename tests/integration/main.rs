//! Integration tests: the decision loop driven end to end against an
//! in-memory auction venue.

mod mock_venue;
mod simulation;
