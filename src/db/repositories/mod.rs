mod calendar_periods;
mod locations;
mod penalties;
mod reservations;
mod tokens;

pub use tokens::TokenRepository;
