use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "recital",
    about = "Align an audiobook manuscript with its spoken recording",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover n-gram anchors and emit the anchor document
    Anchors {
        /// Path to the book index JSON
        #[arg(short, long)]
        book: String,

        /// Path to the ASR response JSON
        #[arg(short, long)]
        asr: String,

        /// Output path for the anchor document (stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Anchor n-gram size
        #[arg(long, default_value_t = 3)]
        ngram: usize,

        /// Include search windows in the document
        #[arg(long)]
        emit_windows: bool,

        /// Known section title, e.g. the chapter directory name
        #[arg(long)]
        section: Option<String>,
    },

    /// Run the full alignment and write the transcript index
    Transcript {
        #[arg(short, long)]
        book: String,

        #[arg(short, long)]
        asr: String,

        /// Output path for the transcript index JSON
        #[arg(short, long)]
        output: String,

        /// Pronunciation lexicon JSON: lexeme → ["variant", ...]
        #[arg(long)]
        lexicon: Option<String>,

        /// Known section title
        #[arg(long)]
        section: Option<String>,

        /// Pin the creation timestamp (RFC 3339) for reproducible output
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Hydrate a transcript index with surface text and diffs
    Hydrate {
        #[arg(short, long)]
        book: String,

        #[arg(short, long)]
        asr: String,

        /// Path to the transcript index JSON
        #[arg(short, long)]
        index: String,

        #[arg(short, long)]
        output: String,
    },

    /// Refine per-sentence time windows with fragments and silences
    Refine {
        #[arg(short, long)]
        asr: String,

        #[arg(short, long)]
        index: String,

        #[arg(short, long)]
        output: String,

        /// Chapter alignment index JSON (chunk offsets + fragments)
        #[arg(long)]
        alignment: Option<String>,

        /// Forced-alignment TextGrid as `<offset_sec>:<path>`; repeatable,
        /// combined into the alignment index (chunk id = file stem)
        #[arg(long = "textgrid")]
        textgrids: Vec<String>,

        /// Silence timeline JSON
        #[arg(long)]
        silences: Option<String>,

        /// Minimum sentence duration in seconds
        #[arg(long, default_value_t = 0.1)]
        min_tail: f64,

        /// Silence snap look-ahead in seconds
        #[arg(long, default_value_t = 0.8)]
        snap_ahead: f64,
    },

    /// Summarize a hydrated transcript for review
    Report {
        /// Path to the hydrated transcript JSON
        #[arg(short, long)]
        hydrated: String,

        /// Write the JSON report here as well as printing the text form
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Align every chapter under a root directory in parallel
    Batch {
        /// Root with book.json and chapters/<name>/asr.json
        #[arg(short, long)]
        root: String,

        /// Pin the creation timestamp (RFC 3339) for reproducible output
        #[arg(long)]
        timestamp: Option<String>,
    },
}
