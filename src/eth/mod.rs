use ethers::prelude::*;

pub mod client;
pub mod events;

abigen!(
    PredictionMarket,
    "./abi/PredictionMarket.json"
);
