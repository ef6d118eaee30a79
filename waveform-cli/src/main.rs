use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

use waveform_backends::{FileAssetResolver, SymphoniaCodecs};
use waveform_core::processing::wav_format::{WavHeader, WAV_HEADER_SIZE};
use waveform_core::storage::metadata::{metadata_path, read_metadata, write_metadata};
use waveform_core::{AudioFileInfo, Draft, VoiceNoteDraft, WaveformGenerator, AUDIO_AAC};

#[derive(Parser)]
#[command(name = "waveform")]
#[command(about = "Voice note waveform extraction and recording")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize an audio file into amplitude bars
    Bars {
        /// Audio file to summarize
        path: PathBuf,

        /// Content type to use instead of guessing from the extension
        #[arg(long)]
        mime: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Reuse or write a `.waveform.json` sidecar next to the file
        #[arg(long)]
        cache: bool,
    },

    /// Print the 44-byte WAV header of a file
    Header {
        path: PathBuf,
    },

    /// Record the default microphone into a streaming WAV file
    #[cfg(feature = "cpal")]
    Record {
        /// Directory the recording is created in
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Recording length in seconds
        #[arg(long, default_value = "5")]
        seconds: u64,
    },

    /// Encode or decode voice note drafts
    #[command(subcommand)]
    Draft(DraftCommand),
}

#[derive(Subcommand)]
enum DraftCommand {
    /// Build a draft row from a recording URI
    Encode {
        uri: String,

        /// Recording size in bytes
        #[arg(long)]
        size: u64,

        /// Recording content type
        #[arg(long = "type", default_value = AUDIO_AAC)]
        content_type: String,
    },

    /// Parse a voice note draft value
    Decode {
        value: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Bars {
            path,
            mime,
            format,
            cache,
        } => bars(&path, mime, format, cache),
        Commands::Header { path } => header(&path),
        #[cfg(feature = "cpal")]
        Commands::Record { dir, seconds } => record(&dir, seconds),
        Commands::Draft(command) => draft(command),
    }
}

fn bars(path: &Path, mime: Option<String>, format: OutputFormat, cache: bool) -> Result<()> {
    if cache && metadata_path(path).is_file() {
        match read_metadata(path) {
            Ok(metadata) => {
                log::info!("Using cached waveform {}", metadata.id);
                return print_info(&metadata.info, format);
            }
            Err(e) => log::warn!("Ignoring unreadable sidecar: {}", e),
        }
    }

    let resolver = match mime {
        Some(mime) => FileAssetResolver::with_mime(mime),
        None => FileAssetResolver::new(),
    };
    let generator = WaveformGenerator::new(resolver, SymphoniaCodecs::new());
    let info = generator
        .generate(path)
        .with_context(|| format!("failed to extract waveform from {}", path.display()))?;

    if cache {
        let metadata = write_metadata(&info, path).context("failed to write waveform sidecar")?;
        log::info!("Wrote {}", metadata_path(path).display());
        log::debug!("Sidecar id {}", metadata.id);
    }

    print_info(&info, format)
}

fn print_info(info: &AudioFileInfo, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(info)?),
        OutputFormat::Text => {
            println!("duration: {:.3}s", info.duration_secs());
            let bars: Vec<String> = info.bars.iter().map(|b| b.to_string()).collect();
            println!("bars: {}", bars.join(" "));
        }
    }
    Ok(())
}

fn header(path: &Path) -> Result<()> {
    let mut file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut bytes = [0u8; WAV_HEADER_SIZE];
    file.read_exact(&mut bytes)
        .with_context(|| format!("{} is shorter than a WAV header", path.display()))?;
    let header = WavHeader::parse(&bytes)?;

    println!("format code:  {}", header.format_code);
    println!("channels:     {}", header.channels);
    println!("sample rate:  {}", header.sample_rate);
    println!("byte rate:    {}", header.byte_rate);
    println!("block align:  {}", header.block_align);
    println!("bit depth:    {}", header.bit_depth);
    if header.is_streaming() {
        println!("sizes:        streaming (unknown length)");
    } else {
        println!("riff size:    {}", header.riff_size);
        println!("data size:    {}", header.data_size);
    }
    Ok(())
}

#[cfg(feature = "cpal")]
fn record(dir: &Path, seconds: u64) -> Result<()> {
    use std::io::BufWriter;
    use std::time::Duration;

    use waveform_backends::CpalCaptureDevice;
    use waveform_core::storage::recording_file::create_recording_file;
    use waveform_core::WavRecorder;

    let (path, file) = create_recording_file(dir)?;
    let recorder = WavRecorder::new(CpalCaptureDevice::default_device());
    recorder.start(BufWriter::new(file))?;
    println!("Recording to {} for {}s...", path.display(), seconds);

    std::thread::sleep(Duration::from_secs(seconds));

    let summary = recorder
        .stop()
        .ok_or_else(|| anyhow!("capture thread did not finish in time"))?;
    if summary.failed {
        return Err(anyhow!("recording failed after {} bytes", summary.bytes_written));
    }
    println!("Wrote {} bytes ({} reads)", summary.bytes_written, summary.reads);

    let generator = WaveformGenerator::new(FileAssetResolver::new(), SymphoniaCodecs::new());
    let info = generator.generate(&path)?;
    write_metadata(&info, &path)?;
    print_info(&info, OutputFormat::Text)
}

fn draft(command: DraftCommand) -> Result<()> {
    match command {
        DraftCommand::Encode {
            uri,
            size,
            content_type,
        } => {
            let uri = Url::parse(&uri).with_context(|| format!("invalid uri {}", uri))?;
            let draft = VoiceNoteDraft::with_content_type(uri, size, &content_type).as_draft();
            println!("{}", serde_json::to_string_pretty(&draft)?);
        }
        DraftCommand::Decode { value } => {
            let draft = Draft {
                draft_type: waveform_core::storage::draft::VOICE_NOTE.to_string(),
                value,
            };
            let note = VoiceNoteDraft::from_draft(&draft).map_err(|e| anyhow!("invalid draft: {}", e))?;
            println!("uri:  {}", note.uri);
            println!("size: {}", note.size);
            println!("type: {}", note.content_type);
        }
    }
    Ok(())
}
