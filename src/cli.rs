//! CLI argument definitions using clap derive macros.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgGroup, ArgMatches, CommandFactory, FromArgMatches, Parser};

use wallhaven_core::download::{DEFAULT_MAX_RETRIES, DEFAULT_WORKERS};
use wallhaven_core::{Category, PlanMode, PlanTarget, Purity, SearchFilter};

/// Download wallhaven.cc collections and uploads.
///
/// Files land in `<downloads_path>/<user>/<collection>/<id>.<ext>` (uploads
/// use an `uploads` directory). Existing files are skipped, and an
/// interrupted or failed download never leaves a partial image behind.
#[derive(Parser, Debug)]
#[command(name = "wallhaven-downloader")]
#[command(author, version, about)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .multiple(true)
        .args(["info", "collections", "uploads"])
))]
pub struct Args {
    /// Print the collections of these users
    #[arg(short, long, num_args = 1.., value_name = "USER")]
    pub info: Vec<String>,

    /// Download collections: USER followed by collection names (all when none).
    /// Repeat for more users: -c alice Cats Dogs -c bob
    #[arg(short, long, num_args = 1.., action = clap::ArgAction::Append, value_name = "USER [NAME]")]
    pub collections: Vec<String>,

    /// `--collections` values split per occurrence; filled by [`Args::parse_grouped`].
    #[arg(skip)]
    pub collection_groups: Vec<Vec<String>>,

    /// Download everything these users uploaded
    #[arg(short, long, num_args = 1.., value_name = "USER")]
    pub uploads: Vec<String>,

    /// Only download these purity levels: sfw, sketchy, nsfw (default: all)
    #[arg(long, num_args = 1.., value_name = "PURITY")]
    pub purity: Vec<Purity>,

    /// Only download these categories: general, people, anime (default: all)
    #[arg(long, num_args = 1.., value_name = "CATEGORY")]
    pub category: Vec<Category>,

    /// Mirror upstream, deleting local files no longer listed (not implemented yet)
    #[arg(short, long)]
    pub sync: bool,

    /// Root directory for downloads
    #[arg(short = 'd', long = "downloads_path", visible_alias = "downloads-path", default_value = "./downloads")]
    pub downloads_path: PathBuf,

    /// Simultaneous downloads (1-6 recommended; more may get throttled)
    #[arg(short, long, default_value_t = DEFAULT_WORKERS as u16, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// API key from https://wallhaven.cc/settings/account (overrides WALLHAVEN_API_KEY)
    #[arg(short = 'a', long = "api_key", visible_alias = "api-key", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Requests per second across all workers (0 disables the limit)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub limit: u32,

    /// Maximum attempts per wallpaper for transient failures (1-10)
    #[arg(short, long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub retries: u32,

    /// Base retry backoff in milliseconds (doubles each attempt, max 60000)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub backoff_ms: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parses the process arguments, exiting on error like [`Parser::parse`].
    pub fn parse_grouped() -> Self {
        Self::try_parse_grouped_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    /// Like [`Parser::try_parse_from`], but also keeps each `-c` occurrence
    /// as its own group so `-c alice Cats -c bob` means two users.
    pub fn try_parse_grouped_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(itr)?;
        let mut args = Self::from_arg_matches(&matches)?;
        args.collection_groups = collection_groups(&matches);
        Ok(args)
    }

    /// Download targets in command-line order: collections first, then uploads.
    pub fn plan_targets(&self) -> Vec<PlanTarget> {
        let collections = self.collection_groups.iter().filter_map(|group| {
            let (username, names) = group.split_first()?;
            Some(PlanTarget::Collections {
                username: username.clone(),
                names: names.to_vec(),
            })
        });
        let uploads = self.uploads.iter().map(|username| PlanTarget::Uploads {
            username: username.clone(),
        });
        collections.chain(uploads).collect()
    }

    pub fn search_filter(&self) -> SearchFilter {
        SearchFilter::new(self.purity.iter().copied(), self.category.iter().copied())
    }

    /// True when `--purity` was given and it asks for content that upstream
    /// only serves with an API key. The all-purity default stays quiet.
    pub fn explicitly_requests_keyed_content(&self) -> bool {
        !self.purity.is_empty() && self.search_filter().requires_api_key()
    }

    pub fn plan_mode(&self) -> PlanMode {
        if self.sync { PlanMode::Sync } else { PlanMode::Download }
    }
}

fn collection_groups(matches: &ArgMatches) -> Vec<Vec<String>> {
    matches
        .get_occurrences::<String>("collections")
        .map(|occurrences| {
            occurrences
                .map(|values| values.cloned().collect())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_grouped_from(std::iter::once("wallhaven-downloader").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_defaults() {
        let args = parse(&["-u", "alice"]).unwrap();
        assert_eq!(args.uploads, vec!["alice"]);
        assert_eq!(args.downloads_path, PathBuf::from("./downloads"));
        assert_eq!(args.workers, 1);
        assert_eq!(args.limit, 1);
        assert_eq!(args.retries, 3);
        assert_eq!(args.backoff_ms, 1000);
        assert!(args.purity.is_empty());
        assert!(args.category.is_empty());
        assert!(args.api_key.is_none());
        assert!(!args.sync);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_requires_an_action() {
        let err = parse(&[]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_collections_group_per_occurrence() {
        let args = parse(&["-c", "alice", "Cats", "Dogs", "-c", "bob"]).unwrap();
        assert_eq!(args.collections, vec!["alice", "Cats", "Dogs", "bob"]);
        assert_eq!(
            args.collection_groups,
            vec![
                vec!["alice".to_string(), "Cats".to_string(), "Dogs".to_string()],
                vec!["bob".to_string()],
            ]
        );
    }

    #[test]
    fn test_cli_collections_mixed_with_other_flags() {
        let args = parse(&["-c", "alice", "-w", "2", "--collections", "bob", "Cats", "-u", "carol"]).unwrap();
        assert_eq!(
            args.collection_groups,
            vec![vec!["alice".to_string()], vec!["bob".to_string(), "Cats".to_string()]]
        );
        assert_eq!(args.workers, 2);
        assert_eq!(args.uploads, vec!["carol"]);
    }

    #[test]
    fn test_cli_without_collections_has_no_groups() {
        let args = parse(&["-u", "alice"]).unwrap();
        assert!(args.collection_groups.is_empty());
    }

    #[test]
    fn test_cli_info_takes_many_users() {
        let args = parse(&["--info", "alice", "bob"]).unwrap();
        assert_eq!(args.info, vec!["alice", "bob"]);
    }

    #[test]
    fn test_cli_purity_and_category_parse() {
        let args = parse(&[
            "-u", "alice", "--purity", "sfw", "sketchy", "--category", "anime",
        ])
        .unwrap();
        assert_eq!(args.purity, vec![Purity::Sfw, Purity::Sketchy]);
        assert_eq!(args.category, vec![Category::Anime]);
    }

    #[test]
    fn test_cli_unknown_purity_rejected() {
        let err = parse(&["-u", "alice", "--purity", "spicy"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_underscore_and_dash_long_names() {
        let args = parse(&["-u", "a", "--downloads_path", "/tmp/w", "--api_key", "k1"]).unwrap();
        assert_eq!(args.downloads_path, PathBuf::from("/tmp/w"));
        assert_eq!(args.api_key.as_deref(), Some("k1"));

        let args = parse(&["-u", "a", "--downloads-path", "/tmp/x", "--api-key", "k2"]).unwrap();
        assert_eq!(args.downloads_path, PathBuf::from("/tmp/x"));
        assert_eq!(args.api_key.as_deref(), Some("k2"));
    }

    #[test]
    fn test_cli_workers_zero_rejected() {
        let err = parse(&["-u", "a", "-w", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_workers_above_recommended_accepted() {
        let args = parse(&["-u", "a", "-w", "12"]).unwrap();
        assert_eq!(args.workers, 12);
    }

    #[test]
    fn test_cli_limit_zero_allowed() {
        let args = parse(&["-u", "a", "-l", "0"]).unwrap();
        assert_eq!(args.limit, 0);
    }

    #[test]
    fn test_cli_retries_bounds() {
        assert_eq!(parse(&["-u", "a", "-r", "5"]).unwrap().retries, 5);
        let err = parse(&["-u", "a", "-r", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let err = parse(&["-u", "a", "-r", "11"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_backoff_ms() {
        assert_eq!(parse(&["-u", "a", "--backoff-ms", "0"]).unwrap().backoff_ms, 0);
        let err = parse(&["-u", "a", "--backoff-ms", "60001"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_verbose_and_quiet() {
        assert_eq!(parse(&["-u", "a", "-vv"]).unwrap().verbose, 2);
        assert!(parse(&["-u", "a", "-q"]).unwrap().quiet);
    }

    #[test]
    fn test_cli_sync_flag() {
        assert!(parse(&["-c", "alice", "-s"]).unwrap().sync);
    }

    #[test]
    fn test_cli_help_and_version() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        let err = parse(&["--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_plan_targets_split_user_from_names() {
        let args = parse(&["-c", "alice", "Cats", "-c", "bob", "-u", "carol"]).unwrap();
        assert_eq!(
            args.plan_targets(),
            vec![
                PlanTarget::Collections {
                    username: "alice".to_string(),
                    names: vec!["Cats".to_string()],
                },
                PlanTarget::Collections {
                    username: "bob".to_string(),
                    names: Vec::new(),
                },
                PlanTarget::Uploads {
                    username: "carol".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_info_only_has_no_targets() {
        let args = parse(&["-i", "alice"]).unwrap();
        assert!(args.plan_targets().is_empty());
        assert_eq!(args.plan_mode(), PlanMode::Download);
    }

    #[test]
    fn test_search_filter_from_flags() {
        let args = parse(&["-u", "alice", "--purity", "sfw", "-s"]).unwrap();
        let filter = args.search_filter();
        assert_eq!(filter.purity_param(), "100");
        assert_eq!(filter.categories_param(), "111");
        assert_eq!(args.plan_mode(), PlanMode::Sync);
    }

    #[test]
    fn test_explicit_nsfw_purity_requests_keyed_content() {
        assert!(parse(&["-u", "a", "--purity", "sfw", "nsfw"]).unwrap().explicitly_requests_keyed_content());
        assert!(!parse(&["-u", "a", "--purity", "sfw", "sketchy"]).unwrap().explicitly_requests_keyed_content());
        // Default filter accepts nsfw but the user did not ask for it
        assert!(!parse(&["-u", "a"]).unwrap().explicitly_requests_keyed_content());
    }
}
