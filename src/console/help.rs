/// Command reference for the interactive console.
pub fn help_text() -> String {
    [
        "Commands:",
        "  search <kw1, kw2, ...>   Start a search (s); keywords are comma-separated",
        "  pause                    Ask the worker to pause after the current keyword (p)",
        "  resume                   Withdraw the pause request (r)",
        "  stop                     Kill the running search (x)",
        "  export [path]            Copy the results file (e); default: timestamped file",
        "  help                     Show this help (?)",
        "  quit                     Stop any search and exit (q)",
    ]
    .join("\n")
}

pub fn banner() -> String {
    format!(
        "marketplace-search {} - type 'help' for commands",
        env!("CARGO_PKG_VERSION")
    )
}
