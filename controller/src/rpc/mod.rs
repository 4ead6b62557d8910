mod client;

pub use client::CoingroClient;
