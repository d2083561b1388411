use clap::Parser;
use tracing::debug;

/// Switches the shell understands. Anything else on the command line (OS
/// session arguments, webview switches) is ignored.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "hyalus")]
#[command(about = "desktop shell for hyalus")]
pub struct LaunchArgs {
    /// launched by the OS login item
    #[arg(long)]
    pub autostart: bool,

    /// launched hidden by the OS login item
    #[arg(long)]
    pub hidden: bool,

    /// in-app location to reopen after a restart
    #[arg(long, value_name = "url")]
    pub resume: Option<String>,

    /// allow more than one running instance
    #[arg(long)]
    pub dupe: bool,

    /// relaunched after installing an update
    #[arg(long)]
    pub updated: bool,
}

const KNOWN: &[&str] = &["--autostart", "--hidden", "--resume", "--dupe", "--updated"];

impl LaunchArgs {
    pub fn from_env() -> Self {
        Self::parse_lenient(std::env::args())
    }

    /// Parses `args` (including the program name), dropping unknown switches
    /// first so a stray argument never discards the ones we know.
    pub fn parse_lenient<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let program = args.next().unwrap_or_else(|| "hyalus".to_string());

        let known: Vec<String> = std::iter::once(program)
            .chain(args.filter(|arg| {
                let name = arg.split('=').next().unwrap_or_default();
                let keep = KNOWN.contains(&name) && (name != "--resume" || arg.contains('='));
                if !keep {
                    debug!("ignoring launch argument {:?}", arg);
                }
                keep
            }))
            .collect();

        Self::try_parse_from(known).unwrap_or_else(|e| {
            debug!("falling back to default launch args: {}", e);
            Self::default()
        })
    }

    /// Whether this launch must defer to an already running instance.
    pub fn single_instance(&self) -> bool {
        !self.dupe
    }

    /// Arguments for relaunching into `url`.
    pub fn resume_args(url: &str) -> Vec<String> {
        vec![format!("--resume={url}")]
    }
}
