pub mod fsops;
