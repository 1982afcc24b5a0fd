pub mod graph;
pub mod workflow;

pub use graph::{Agent, Graph, Node, NodeId};
pub use workflow::bitcoin_news::{
    BitcoinNewsReport, BitcoinNewsState, BitcoinNewsWorkflow, Sentiment, SentimentLabel,
};
pub use workflow::{NodeHandler, RunReport, StepRecord, WorkflowRunner};
