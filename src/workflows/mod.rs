pub mod ballots;
