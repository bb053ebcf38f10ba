use anyhow::{bail, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, InfoArgs};
use crate::input::InputReader;
use dtsuhd::process::extract::{Extractor, Frame};
use dtsuhd::process::parse::Parser;
use dtsuhd::structs::descriptor::DescriptorInfo;
use dtsuhd::utils::errors::ExtractError;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing DTS-UHD stream: {}", args.input.display());

    let mut context = AnalysisContext::default();

    if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Analyzing frames...");
        context.pb = Some(pb);
    }

    let mut input_reader = InputReader::new(&args.input)?;
    let mut extractor = Extractor::default();

    input_reader.process_chunks(64 * 1024, |chunk| {
        context.total_bytes += chunk.len();

        let mut rest = chunk;
        loop {
            let consumed = extractor.push_bytes(rest);
            rest = &rest[consumed..];

            for frame_result in extractor.by_ref() {
                match frame_result {
                    Ok(frame) => context.process_frame(&frame)?,
                    Err(ExtractError::InsufficientData) => {}
                    Err(e) => {
                        if cli.strict {
                            bail!(e);
                        }
                        log::warn!("frame {}: {e}", context.frame_count);
                    }
                }
            }

            if rest.is_empty() {
                break;
            }
        }

        Ok(true)
    })?;

    if let Some(ref pb) = context.pb {
        pb.finish_and_clear();
    }

    match context.descriptor {
        Some(_) => context.print_summary(),
        None => {
            println!("No DTS-UHD sync frame found in the file.");
            println!("This doesn't appear to be a valid DTS-UHD stream.");
        }
    }

    Ok(())
}

#[derive(Default)]
struct AnalysisContext {
    descriptor: Option<DescriptorInfo>,
    frame_count: usize,
    sync_frame_count: usize,
    total_samples: u64,
    sample_rate: u32,
    total_bytes: usize,
    pb: Option<ProgressBar>,
}

impl AnalysisContext {
    fn process_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.descriptor.is_none() && frame.is_sync() {
            // Re-parse the sync frame with a scratch parser to walk the
            // metadata chunks and build the descriptor.
            let (_, descriptor) = Parser::default().parse_with_descriptor(frame.as_ref())?;
            if let Some(descriptor) = descriptor {
                self.display_descriptor(&descriptor);
                self.descriptor = Some(descriptor);
            }
        }

        self.frame_count += 1;
        self.sync_frame_count += frame.is_sync() as usize;
        self.total_samples += frame.info.sample_count as u64;
        self.sample_rate = frame.info.sample_rate;

        if self.frame_count % 100 == 0 {
            if let Some(ref pb) = self.pb {
                pb.set_message(format!("Analyzing frames...       {}", self.frame_count));
                pb.tick();
            }
        }

        Ok(())
    }

    fn display_descriptor(&self, descriptor: &DescriptorInfo) {
        let print = || {
            println!();
            println!("DTS-UHD Stream Information");
            println!("==========================");
            println!();
            println!("  Coding name               {}", descriptor.coding_name);
            println!(
                "  Decoder profile           {}",
                descriptor.decoder_profile_code as u32 + 2
            );
            println!("  Sample rate               {} Hz", descriptor.sample_rate);
            println!("  Sample size               {} bits", descriptor.sample_size);
            println!(
                "  Channels                  {} (mask {:#010X})",
                descriptor.channel_count, descriptor.channel_mask
            );
            println!("  Representation            {:?}", descriptor.rep_type);
            println!(
                "  Presentations             {}",
                descriptor.num_pres_code as u32 + 1
            );
            println!();
        };

        match &self.pb {
            Some(pb) => pb.suspend(print),
            None => print(),
        }
    }

    fn print_summary(&self) {
        println!("Analysis Summary");
        println!("  Frames processed          {}", self.frame_count);
        println!("  Sync frames               {}", self.sync_frame_count);

        let size_mb = self.total_bytes as f64 / 1_000_000.0;
        println!(
            "  Size                      {size_mb:.2} MB ({} bytes)",
            self.total_bytes
        );

        if self.sample_rate > 0 {
            let duration_secs = self.total_samples as f64 / self.sample_rate as f64;
            println!("  Duration                  {}", time_str(duration_secs));

            if duration_secs > 0.0 {
                let avg_data_rate_kbps = (self.total_bytes as f64 * 8.0) / (duration_secs * 1000.0);
                println!("  Average data rate         {avg_data_rate_kbps:.1} kbps");
            }
        }

        println!();
    }
}

fn time_str(seconds: f64) -> String {
    let whole = seconds as u64;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let secs = seconds - (hours * 3600 + minutes * 60) as f64;
    format!("{hours:02}:{minutes:02}:{secs:06.3}")
}
