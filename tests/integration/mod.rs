mod config;
mod listing;
mod malformed;
mod report;
mod round_trip;
