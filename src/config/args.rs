// Command-line argument parsing

use clap::Parser;

/// Early, user-space OOM responder: watches free memory and swap and kills
/// processes before the kernel OOM killer acts.
#[derive(Parser, Debug)]
#[command(name = "oom-sentinel")]
#[command(version = env!("CARGO_PKG_VERSION"), disable_version_flag = true)]
#[command(about = "Early OOM daemon", long_about = None)]
pub struct Args {
    /// Print version and exit
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    pub version: (),

    /// Memory term%[,kill%] (default: 10, kill defaults to term/2), max 99
    #[arg(short = 'm', long = "mem", value_name = "PERCENT[,KILL_PERCENT]")]
    pub mem_pct: Option<String>,

    /// Swap term%[,kill%] (default: 10, kill defaults to term/2), max 100
    #[arg(short = 's', long = "swap", value_name = "PERCENT[,KILL_PERCENT]")]
    pub swap_pct: Option<String>,

    /// Memory term KiB[,kill KiB] — absolute equivalent of -m
    #[arg(short = 'M', long = "mem-size", value_name = "KIB[,KILL_KIB]")]
    pub mem_kib: Option<String>,

    /// Swap term KiB[,kill KiB] — absolute equivalent of -s
    #[arg(short = 'S', long = "swap-size", value_name = "KIB[,KILL_KIB]")]
    pub swap_kib: Option<String>,

    /// Ignore a positive oom_score_adj when computing badness
    #[arg(short = 'i', long = "ignore-oom-score-adj")]
    pub ignore_oom_score_adj: bool,

    /// Enable desktop notifications after a kill
    #[arg(short = 'n', long = "notify")]
    pub notify: bool,

    /// Accepted for compatibility; argument is ignored
    #[arg(short = 'N', long = "notify-compat", value_name = "ARG", hide = true)]
    pub notify_compat: Option<String>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Status report interval in seconds (0 disables)
    #[arg(short = 'r', long = "report", value_name = "SECONDS")]
    pub report: Option<u64>,

    /// Raise daemon priority and set our own oom_score_adj to -100
    #[arg(short = 'p', long = "priority")]
    pub priority: bool,

    /// Load configuration from this file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<String>,

    /// Prefer killing processes whose name matches this regex
    #[arg(long = "prefer", value_name = "REGEX")]
    pub prefer: Option<String>,

    /// Avoid killing processes whose name matches this regex
    #[arg(long = "avoid", value_name = "REGEX")]
    pub avoid: Option<String>,

    /// Select a victim and report it without sending any signal ≠ 0
    #[arg(long = "dryrun")]
    pub dry_run: bool,

    /// Use syslog instead of stdout/stderr for logging
    #[arg(long = "syslog")]
    pub syslog: bool,

    /// Script run (fire-and-forget) before signalling a victim
    #[arg(long = "pre-kill-script", value_name = "PATH")]
    pub pre_kill_script: Option<String>,

    /// Script run (fire-and-forget) after a victim is signalled
    #[arg(long = "post-kill-script", value_name = "PATH")]
    pub post_kill_script: Option<String>,
}

impl Args {
    /// Parse arguments from the process's own argv.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
