pub mod applicator;
pub mod changes;
pub mod handlers;
pub mod pipeline;
pub mod similarity;
