pub mod error_collector_layer;
pub mod generator;
pub mod openai_generator;
pub mod sse;

pub use error_collector_layer::ErrorCollectorLayer;
pub use generator::{EchoGenerator, FragmentStream, MessageGenerator, ScriptedGenerator};
pub use openai_generator::{GeneratorError, OpenAiConfig, OpenAiGenerator};
