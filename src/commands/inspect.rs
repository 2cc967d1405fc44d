//! `feather inspect` - report what a .blend header says

use feather_core::error::Result;
use feather_core::header::{self, BlendHeader, Compression, Endianness};
use feather_core::inputs;

use crate::cli::args::InspectArgs;
use crate::commands::dispatch::CommandContext;
use crate::output_by_format;

pub fn execute(ctx: &CommandContext, args: &InspectArgs) -> Result<()> {
    inputs::check_input(&args.path, "blend")?;
    let header = header::sniff(&args.path)?;

    output_by_format!(ctx.cli.format, json => {
        let output = serde_json::json!({
            "path": args.path.display().to_string(),
            "version": header.version.to_string(),
            "pointer_size": header.pointer_size,
            "endianness": header.endianness,
            "compression": header.compression,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }, human => {
        print_human(ctx, &header);
    });
    Ok(())
}

fn print_human(ctx: &CommandContext, header: &BlendHeader) {
    if ctx.cli.quiet {
        println!("{}", header.version);
        return;
    }
    let endianness = match header.endianness {
        Endianness::Little => "little-endian",
        Endianness::Big => "big-endian",
    };
    let compression = match header.compression {
        Compression::None => "none",
        Compression::Gzip => "gzip",
        Compression::Zstd => "zstd",
    };
    println!("Blender {}", header.version);
    println!("  pointers:    {}-bit", u32::from(header.pointer_size) * 8);
    println!("  byte order:  {endianness}");
    println!("  compression: {compression}");
}
