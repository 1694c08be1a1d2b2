//! PDF Assemble CLI tool
//!
//! A command-line tool for splitting, combining, mixing and cropping PDFs.

use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;
use log::{info, warn};

use pdf_assemble::geometry::RectangularBox;
use pdf_assemble::pdf::{extract_metadata, CopyMode, CopyWarning, PdfVersion};
use pdf_assemble::task::{
    execute, CombineReorderParameters, CopyPlanEntry, CropParameters, MixInput, MixParameters,
    OutputDescriptor, OutputOptions, SplitParameters, SplitPolicy, TaskEvents, TaskParameters,
    TaskState,
};

/// PDF Assemble - Split, combine, mix and crop PDF pages
#[derive(Parser)]
#[command(name = "pdf-assemble")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Split a document every 10 pages
    pdf-assemble split handbook.pdf -o parts --every 10

    # Split at every top-level bookmark, naming outputs after the bookmark
    pdf-assemble split book.pdf -o chapters --bookmark-level 1 --prefix \"[FILENUMBER] [BOOKMARK_NAME]\"

    # Combine pages 1-3 of a.pdf with page 2 of b.pdf
    pdf-assemble combine a.pdf b.pdf -o out.pdf --plan 0:1-3,1:2

    # Interleave scanned front and back sides
    pdf-assemble mix fronts.pdf backs.pdf -o scan.pdf --reverse-second

    # Cut every page in two halves
    pdf-assemble crop slides.pdf -o halves.pdf --area 0:396:612:792 --area 0:0:612:396")]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that writes outputs
#[derive(Args)]
struct OutputArgs {
    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    /// Copy only the resources each page's content actually uses
    #[arg(long)]
    optimized: bool,

    /// PDF version written to the outputs
    #[arg(long, default_value = "1.5")]
    pdf_version: PdfVersion,

    /// Do not compress output streams
    #[arg(long)]
    no_compress: bool,
}

impl OutputArgs {
    fn options(&self) -> OutputOptions {
        OutputOptions {
            overwrite: self.overwrite,
            copy_mode: if self.optimized {
                CopyMode::Optimized
            } else {
                CopyMode::Full
            },
            version: self.pdf_version,
            compress: !self.no_compress,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Split a PDF into several files
    Split {
        /// Input PDF file
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Output name template ([BASENAME], [FILENUMBER], [CURRENTPAGE], [BOOKMARK_NAME], [TIMESTAMP])
        #[arg(long, default_value = "[BASENAME]_[FILENUMBER]")]
        prefix: String,

        /// Start a new file every N pages
        #[arg(long, group = "policy")]
        every: Option<u32>,

        /// Start a new file after each of these pages (e.g. 3,7,12)
        #[arg(long, group = "policy", value_delimiter = ',')]
        after: Option<Vec<u32>>,

        /// Start a new file at each bookmark of this outline level
        #[arg(long, group = "policy")]
        bookmark_level: Option<u32>,

        /// Only split at bookmarks whose title matches this regular expression
        #[arg(long, requires = "bookmark_level")]
        bookmark_match: Option<String>,

        /// Start a new file at pages whose text matches this regular expression
        #[arg(long, group = "policy")]
        text_pattern: Option<String>,

        #[command(flatten)]
        output_args: OutputArgs,
    },

    /// Combine pages of several PDFs into one, in any order
    Combine {
        /// Input PDF files (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,

        /// Pages to copy as source:pages groups, e.g. 0:1-3,1:2 (default: every page of every input)
        #[arg(long)]
        plan: Option<String>,

        /// Rebuild the interactive form from the copied fields
        #[arg(long)]
        form_fields: bool,

        #[command(flatten)]
        output_args: OutputArgs,
    },

    /// Alternate the pages of two PDFs
    Mix {
        /// First input PDF
        first: PathBuf,

        /// Second input PDF
        second: PathBuf,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,

        /// Pages taken from the first input at a time
        #[arg(long, default_value_t = 1)]
        first_step: u32,

        /// Pages taken from the second input at a time
        #[arg(long, default_value_t = 1)]
        second_step: u32,

        /// Take the first input's pages last to first
        #[arg(long)]
        reverse_first: bool,

        /// Take the second input's pages last to first
        #[arg(long)]
        reverse_second: bool,

        #[command(flatten)]
        output_args: OutputArgs,
    },

    /// Crop every page to one or more areas
    Crop {
        /// Input PDF file
        input: PathBuf,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,

        /// Area as left:bottom:right:top, each in pt (default), mm or in; repeat for several areas
        #[arg(long = "area", required = true)]
        areas: Vec<RectangularBox>,

        #[command(flatten)]
        output_args: OutputArgs,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

/// Reports task progress through the log
#[derive(Default)]
struct LogEvents {
    warnings: usize,
}

impl TaskEvents for LogEvents {
    fn step_completed(&mut self, completed: u32, total: u32) {
        info!("{} of {} steps completed", completed, total);
    }

    fn warning(&mut self, warning: &CopyWarning) {
        self.warnings += 1;
        warn!("{}", warning);
    }

    fn state_changed(&mut self, _from: TaskState, to: TaskState) {
        if to == TaskState::Failed {
            warn!("Task failed, no output was written under its final name");
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Info { input } => cmd_info(input),
        command => task_parameters(command).and_then(run_task),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Expand glob patterns in input paths
fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched: Vec<PathBuf> = Vec::new();
            for entry in glob(&pattern).with_context(|| format!("Invalid pattern {}", pattern))? {
                match entry {
                    Ok(path) => matched.push(path),
                    Err(e) => warn!("glob error for {}: {}", pattern, e),
                }
            }
            if matched.is_empty() {
                bail!("No files matched pattern: {}", pattern);
            }
            // Sort each pattern's matches, keep the order patterns were given in
            matched.sort();
            paths.extend(matched);
        } else {
            // No glob characters, treat as literal path
            paths.push(PathBuf::from(pattern));
        }
    }

    Ok(paths)
}

fn task_parameters(command: Commands) -> Result<TaskParameters> {
    let parameters = match command {
        Commands::Split {
            input,
            output,
            prefix,
            every,
            after,
            bookmark_level,
            bookmark_match,
            text_pattern,
            output_args,
        } => {
            let policy = match (every, after, bookmark_level, text_pattern) {
                (Some(n), None, None, None) => SplitPolicy::EveryNPages(n),
                (None, Some(pages), None, None) => SplitPolicy::AfterPages(pages),
                (None, None, Some(level), None) => SplitPolicy::BookmarkLevel {
                    level,
                    matching: bookmark_match,
                },
                (None, None, None, Some(pattern)) => SplitPolicy::TextContent { pattern },
                _ => bail!(
                    "Choose exactly one of --every, --after, --bookmark-level or --text-pattern"
                ),
            };
            TaskParameters::Split(SplitParameters {
                source: input,
                policy,
                output_dir: output,
                prefix,
                options: output_args.options(),
            })
        }
        Commands::Combine {
            inputs,
            output,
            plan,
            form_fields,
            output_args,
        } => {
            let sources = expand_globs(inputs)?;
            let plan = match plan {
                Some(plan) => CopyPlanEntry::parse_plan(&plan)?,
                None => {
                    let mut page_counts = Vec::with_capacity(sources.len());
                    for source in &sources {
                        let metadata = extract_metadata(source)
                            .with_context(|| format!("Unable to read {}", source.display()))?;
                        page_counts.push(metadata.page_count);
                    }
                    CombineReorderParameters::concatenate(sources.clone(), &page_counts, output.clone())
                        .plan
                }
            };
            TaskParameters::CombineReorder(CombineReorderParameters {
                sources,
                plan,
                output,
                copy_form_fields: form_fields,
                options: output_args.options(),
            })
        }
        Commands::Mix {
            first,
            second,
            output,
            first_step,
            second_step,
            reverse_first,
            reverse_second,
            output_args,
        } => TaskParameters::Mix(MixParameters {
            first: MixInput {
                path: first,
                reverse: reverse_first,
                step: first_step,
            },
            second: MixInput {
                path: second,
                reverse: reverse_second,
                step: second_step,
            },
            output,
            options: output_args.options(),
        }),
        Commands::Crop {
            input,
            output,
            areas,
            output_args,
        } => TaskParameters::Crop(CropParameters {
            source: input,
            areas,
            output,
            options: output_args.options(),
        }),
        Commands::Info { .. } => bail!("info does not run a task"),
    };
    Ok(parameters)
}

fn run_task(parameters: TaskParameters) -> Result<()> {
    let mut events = LogEvents::default();
    let outputs: Vec<OutputDescriptor> = execute(&parameters, &mut events)?;

    for output in &outputs {
        eprintln!("Written: {} ({} pages)", output.destination.display(), output.pages);
    }
    if events.warnings > 0 {
        eprintln!("Completed with {} warnings", events.warnings);
    }
    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> Result<()> {
    let metadata = extract_metadata(&input)
        .with_context(|| format!("Unable to read {}", input.display()))?;

    println!("File: {}", input.display());
    println!("Version: {}", metadata.version);
    println!("Pages: {}", metadata.page_count);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }
    println!(
        "Page assembly: {}",
        if metadata.assembly_allowed { "allowed" } else { "not allowed" }
    );

    Ok(())
}
