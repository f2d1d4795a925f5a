use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::{Level, info};

use text2model::logging::{self, LogFormat};
use text2model::{
    DanglingPolicy, Direction, Encoder, LlmConnector, ModelTransformer, OutputFormat, Pipeline,
    PipelineRequest, Settings, TransformerClient, TypePolicy,
};

/// Turn process descriptions and LLM process graphs into BPMN or PNML
#[derive(Parser, Debug)]
#[command(name = "text2model", version)]
#[command(about = "Encode LLM process graphs as BPMN 2.0 or PNML", long_about = None)]
struct Cli {
    /// Settings file (TOML or YAML)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Log level for this crate (RUST_LOG takes precedence)
    #[arg(long, default_value_t = Level::WARN, global = true)]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a JSON process graph (or a raw LLM reply) file
    Encode {
        /// Input JSON file (use "-" for stdin)
        #[arg(value_name = "INPUT", default_value = "-")]
        input: PathBuf,

        #[command(flatten)]
        encoder: EncoderArgs,

        /// Output document kind
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Describe a process in natural language and get BPMN (or PNML) back
    Generate {
        /// Process description; read from stdin when omitted
        #[arg(value_name = "TEXT")]
        text: Option<String>,

        /// API key forwarded to the LLM connector (falls back to LLM_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Run the result through the PNML transformer
        #[arg(long)]
        pnml: bool,

        #[command(flatten)]
        encoder: EncoderArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Convert a BPMN file to PNML with the transformer service
    Transform {
        /// Input BPMN file (use "-" for stdin)
        #[arg(value_name = "INPUT", default_value = "-")]
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct EncoderArgs {
    /// Type tag handling
    #[arg(long, value_enum)]
    policy: Option<TypePolicy>,

    /// Handling of flows whose endpoints are not declared
    #[arg(long, value_enum)]
    dangling: Option<DanglingPolicy>,

    /// Omit incoming/outgoing children on BPMN nodes
    #[arg(long)]
    no_wiring: bool,

    /// Also write bpmn_output.bpmn / pnml_output.pnml into this directory
    #[arg(long, value_name = "DIR")]
    side_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output file path (stdout when omitted)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "text2model", &mut io::stdout());
        return Ok(());
    }

    logging::init(cli.log_format, cli.log_level).map_err(|e| e.to_string())?;
    run(cli).map_err(|e| e.to_string())
}

fn run(cli: Cli) -> text2model::Result<()> {
    let mut settings = match cli.config {
        Some(ref path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_env()?;

    match cli.command {
        Command::Encode {
            input,
            encoder,
            format,
            output,
        } => {
            encoder.apply(&mut settings);
            if let Some(format) = format {
                settings.encoder.format = format;
            }
            let reply = read_input(&input)?;
            let xml = Encoder::new(settings.encoder).encode_reply(&reply)?;
            write_output(output.output.as_deref(), &xml)
        }
        Command::Generate {
            text,
            api_key,
            pnml,
            encoder,
            output,
        } => {
            encoder.apply(&mut settings);
            let text = match text {
                Some(text) => text,
                None => read_input(Path::new("-"))?,
            };
            let request = PipelineRequest {
                text: Some(text),
                api_key: api_key.or_else(|| std::env::var("LLM_API_KEY").ok()),
            };
            let direction = if pnml {
                Direction::BpmnToPnml
            } else {
                Direction::PnmlToBpmn
            };
            let pipeline = Pipeline::new(
                LlmConnector::from_config(&settings.upstream),
                TransformerClient::from_config(&settings.upstream),
                settings.encoder,
            );
            let response = pipeline.run(&request, direction)?;
            write_output(output.output.as_deref(), &response.result)
        }
        Command::Transform { input, output } => {
            let bpmn = read_input(&input)?;
            let pnml = TransformerClient::from_config(&settings.upstream).bpmn_to_pnml(&bpmn)?;
            write_output(output.output.as_deref(), &pnml)
        }
        Command::Completions { .. } => Ok(()),
    }
}

impl EncoderArgs {
    fn apply(self, settings: &mut Settings) {
        let options = &mut settings.encoder;
        if let Some(policy) = self.policy {
            options.policy = policy;
        }
        if let Some(dangling) = self.dangling {
            options.dangling = dangling;
        }
        if self.no_wiring {
            options.wiring = false;
        }
        if let Some(dir) = self.side_file {
            options.side_file = true;
            options.side_file_dir = dir;
        }
    }
}

fn read_input(path: &Path) -> text2model::Result<String> {
    if path.to_str() == Some("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

fn write_output(path: Option<&Path>, contents: &str) -> text2model::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, contents)?;
            info!(path = %path.display(), bytes = contents.len(), "document written");
            eprintln!("Saved to: {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
