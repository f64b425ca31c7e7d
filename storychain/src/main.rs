use colored::Colorize;
use storychain::commands::command_argument_builder;
use storychain::handlers::{Interrupted, Shutdown, handle_crawl, handle_export, init_tracing};

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_tracing(chosen_command.get_flag("verbose"));
    let shutdown = Shutdown::ctrl_c();

    let result = match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet, &shutdown).await,
        Some(("export", primary_command)) => {
            handle_export(primary_command, quiet, &shutdown).await
        }
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        // 128 + SIGINT, as a shell reports an interrupted command
        let code = if e.is::<Interrupted>() { 130 } else { 1 };
        std::process::exit(code);
    }
}
