pub mod canned;
pub mod db;
pub mod memory;
pub mod payments;
pub mod research_llm;

pub use canned::CannedResearchAdapter;
pub use db::DbAdapter;
pub use memory::MemoryStore;
pub use payments::RazorpayAdapter;
pub use research_llm::OpenAiResearchAdapter;
