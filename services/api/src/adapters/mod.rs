pub mod db;
pub mod reflection_llm;
pub mod scripture_http;

pub use db::DbAdapter;
pub use reflection_llm::OpenAiReflectionAdapter;
pub use scripture_http::ScriptureApiAdapter;
