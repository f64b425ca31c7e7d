use clap::{Arg, arg, command};
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

/// Flags shared by every subcommand that walks a chain.
fn walk_args() -> [Arg; 5] {
    [
        arg!(-d --"max-depth" <DEPTH>)
            .required(false)
            .help("Maximum number of hops to follow from the first post")
            .value_parser(clap::value_parser!(usize))
            .default_value("15"),
        arg!(--"threshold" <SIMILARITY>)
            .required(false)
            .help("Title similarity above which the similarity signal fires")
            .value_parser(clap::value_parser!(f32))
            .default_value("0.8"),
        arg!(--"embedder" <BACKEND>)
            .required(false)
            .help("Title embedding backend (fastembed needs the `fastembed` build feature)")
            .value_parser(["hashing", "fastembed"])
            .default_value("hashing"),
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Request timeout in seconds")
            .value_parser(clap::value_parser!(u64))
            .default_value("10"),
        arg!(--"user-agent" <AGENT>)
            .required(false)
            .help("User-Agent header sent with every request"),
    ]
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("storychain")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("storychain")
        .styles(CLAP_STYLING)
        .about("Follows a serialized story post by post and binds it into a book")
        .arg(
            arg!(-q --"quiet" "Suppress progress and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Enable debug logging (RUST_LOG overrides)")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            command!("crawl")
                .about("Walk the chain of posts starting at URL and list them in reading order")
                .arg(
                    arg!(<URL>)
                        .help("The first post of the story")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the URL list to a file, one per line (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .args(walk_args()),
        )
        .subcommand(
            command!("export")
                .about("Fetch every post of a story and write it out as a book")
                .arg(
                    arg!([URL])
                        .help("The first post of the story")
                        .value_parser(clap::value_parser!(Url))
                        .required_unless_present("from-list")
                        .conflicts_with("from-list"),
                )
                .arg(
                    arg!(-l --"from-list" <PATH>)
                        .required(false)
                        .help("Skip the walk and read post URLs from a newline-delimited file")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-e --"edit")
                        .required(false)
                        .help("Open the URL list in $EDITOR before fetching posts")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Book format: markdown, json, or anything pandoc writes (epub, pdf, html, ...)")
                        .default_value("epub"),
                )
                .arg(
                    arg!(--"cover" <IMAGE>)
                        .required(false)
                        .help("Cover image for EPUB output")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Output file (default: derived from the book title)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .args(walk_args()),
        )
}
