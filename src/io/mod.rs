/// CSV export of step results and draw events.
pub mod export;
