use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};

use anyhow::{bail, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, DemuxArgs};
use dtsuhd::process::demux::{Demuxer, FILE_EXTENSION};

pub fn cmd_demux(args: &DemuxArgs, _cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    if args.input.as_os_str() == "-" {
        bail!("demuxing requires a seekable input file");
    }
    if !args.input.extension().is_some_and(|ext| ext == FILE_EXTENSION) {
        log::debug!("input does not carry the .{FILE_EXTENSION} extension");
    }

    let file = BufReader::new(File::open(&args.input)?);
    let mut demuxer = Demuxer::open(file)?;

    let descriptor = demuxer.descriptor();
    log::info!(
        "stream: {}, {} channels, {} Hz, {} presentation(s)",
        descriptor.coding_name,
        descriptor.channel_count,
        descriptor.sample_rate,
        descriptor.num_pres_code as u32 + 1,
    );

    if let Some(path) = &args.extradata {
        let extradata = descriptor.extradata()?;
        fs::write(path, &extradata)?;
        log::info!("wrote {} bytes of extradata to {}", extradata.len(), path.display());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("raw.dtsx"));
    let mut writer = BufWriter::new(File::create(&output)?);

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new(demuxer.payload_bytes()));
            pb.set_style(ProgressStyle::with_template(
                "{bar:40.cyan/blue} {bytes}/{total_bytes} {msg}",
            )?);
            Some(pb)
        }
        None => None,
    };

    let mut written = 0u64;
    while let Some(packet) = demuxer.next_packet()? {
        writer.write_all(&packet)?;
        written += packet.len() as u64;
        if let Some(ref pb) = pb {
            pb.set_position(written);
        }
    }
    writer.flush()?;

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    log::info!("wrote {written} payload bytes to {}", output.display());

    Ok(())
}
