// Core payment types shared by the event source, the ledger and the distributor
pub mod models;
