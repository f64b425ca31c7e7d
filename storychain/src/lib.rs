pub mod commands;

// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    edit_url_list, load_urls_from_file, load_urls_from_source, parse_url_line, parse_url_list,
    write_url_list,
};

// Re-export walk functionality from storychain-core
pub use storychain_core::crawl::{WalkOptions, execute_walk, generate_chain_report};
