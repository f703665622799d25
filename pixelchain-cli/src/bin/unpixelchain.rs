use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{CommandFactory, Parser};
use clap_complete::{Shell, generate};
use console::Term;
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};
use pixelchain::{
    FragmentHeader, HeaderCodec, Layout, Legacy, PixelBytes, PixelChainError, Reassembly,
    Simplified, load_fragment,
};
use pixelchain_cli::{BLUE_BOLD, GREEN_BOLD, RED_BOLD, after_help, status};
use tracing::debug;

/// tool to reassemble a file from a chain of pixel-encoded png fragments
#[derive(Parser)]
#[command(author,
          version,
          name = "unpixelchain",
          after_help = after_help(),
          max_term_width = 98,
          styles = clap_cargo::style::CLAP_STYLING,
)]
struct Args {
    /// First fragment of the chain
    ///
    /// Required for all usage, except --completions. The remaining fragments are looked up
    /// next to it as <hex(identity)>_<sequence>.png
    #[arg(required_unless_present = "completions")]
    fragment: Option<PathBuf>,

    /// Write the reassembled file into DIR
    #[arg(short, long, default_value = ".", name = "DIR")]
    dest: PathBuf,

    /// Header layout of the fragments, this can not be detected from the images
    #[arg(
        short,
        long,
        default_value_t = Layout::default(),
        value_parser = PossibleValuesParser::new(Layout::NAMES).try_map(|s| s.parse::<Layout>()),
    )]
    layout: Layout,

    /// Display the header of FRAGMENT and exit (ignores --quiet)
    #[arg(short, long)]
    stat: bool,

    /// Print fragments as they are consumed
    #[arg(short, long)]
    info: bool,

    /// Emit shell completion scripts
    #[arg(long)]
    completions: Option<Shell>,

    /// Silence all progress bar and RUST_LOG output
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if !args.quiet {
        tracing_subscriber::fmt::init();
    }

    if let Some(completions) = args.completions {
        let mut cmd = Args::command();
        let name = cmd.get_name().to_string();
        generate(completions, &mut cmd, name, &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let Some(fragment) = args.fragment.as_deref() else {
        eprintln!("Error: FRAGMENT is required");
        return ExitCode::FAILURE;
    };

    debug!("layout {}, destination {}", args.layout, args.dest.display());
    if args.stat {
        return stat(&args, fragment);
    }

    match args.layout {
        Layout::Legacy => extract::<Legacy>(&args, fragment),
        Layout::Simplified => extract::<Simplified>(&args, fragment),
    }
}

fn stat(args: &Args, fragment: &Path) -> ExitCode {
    let header = load_fragment(fragment)
        .and_then(|image| args.layout.decode_header(&PixelBytes::from_rgba(&image)));
    match header {
        Ok(header) => {
            print_header(args.layout, &header);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", status(&RED_BOLD, "Failed", failure(fragment, &e)));
            ExitCode::FAILURE
        }
    }
}

/// Error line for `fragment`, naming the file only if the error does not already
fn failure(fragment: &Path, e: &PixelChainError) -> String {
    match e.path() {
        Some(_) => e.to_string(),
        None => format!("{}: {e}", fragment.display()),
    }
}

fn print_header(layout: Layout, header: &FragmentHeader) {
    println!("layout:               {layout}");
    println!("identity:             {}", header.identity);
    println!(
        "sequence:             {} of {}",
        header.sequence_number, header.last_sequence_number
    );
    println!("file size:            {}", header.file_size);
    if let Some(body_size) = header.body_size {
        println!("body size:            {body_size}");
    }
    match header.header_size {
        Some(declared) => {
            println!("header size:          {} (declared {declared})", layout.header_len(header))
        }
        None => println!("header size:          {}", layout.header_len(header)),
    }
    println!("output file:          {}", String::from_utf8_lossy(&header.output_file_name));
    println!("first fragment:       {}", header.identity.fragment_file_name(1));
}

fn extract<C: HeaderCodec>(args: &Args, fragment: &Path) -> ExitCode {
    let start = Instant::now();

    let mut reassembly = match Reassembly::<C>::open(fragment, &args.dest) {
        Ok(reassembly) => reassembly,
        Err(e) => {
            eprintln!("{}", status(&RED_BOLD, "Failed", failure(fragment, &e)));
            return ExitCode::FAILURE;
        }
    };

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(u64::from(reassembly.state().last_sequence))
    };
    if let Ok(style) = ProgressStyle::with_template(
        // note that bar size is fixed unlike cargo which is dynamic
        if Term::stdout().size().1 > 80 {
            "{prefix:>16.cyan.bold} [{bar:57}] {pos}/{len} {wide_msg}"
        } else {
            "{prefix:>16.cyan.bold} [{bar:57}] {pos}/{len}"
        },
    ) {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_prefix("Reassembling");

    while let Some(path) = reassembly.next_path() {
        pb.set_message(path.display().to_string());
        match reassembly.next_fragment() {
            Some(Ok(report)) => {
                if args.info && !args.quiet {
                    let line = format!(
                        "{} ({}/{} bytes)",
                        report.path.display(),
                        report.written,
                        report.payload_len
                    );
                    pb.println(status(&BLUE_BOLD, "Consumed", line));
                }
                pb.set_length(u64::from(reassembly.state().last_sequence));
                pb.inc(1);
            }
            Some(Err(e)) => {
                pb.finish_and_clear();
                eprintln!("{}", status(&RED_BOLD, "Failed", e));
                return ExitCode::FAILURE;
            }
            None => break,
        }
    }
    pb.finish_and_clear();

    match reassembly.finish() {
        Ok(done) => {
            if !args.quiet {
                let line = format!(
                    "{} ({}) from {} fragments in {}",
                    done.output.display(),
                    HumanBytes(done.written),
                    done.fragments,
                    HumanDuration(start.elapsed())
                );
                println!("{}", status(&GREEN_BOLD, "Finished", line));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", status(&RED_BOLD, "Failed", e));
            ExitCode::FAILURE
        }
    }
}
