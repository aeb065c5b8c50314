pub mod anthropic;
pub mod context;
pub(crate) mod error_shapes;
pub mod model_map;
pub mod openai_chat;
pub mod upstream;
