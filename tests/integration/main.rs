//! Integration tests: full observe→decide→dispatch cycles against
//! scripted market data and the paper chain.

mod mock_market;
mod simulation;
