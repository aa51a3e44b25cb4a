//! Ambient smoke-test CLI: rewrite a Lua source file's string literals
//! and report how much of the bytecode obfuscation core would emit for a
//! toy chunk. Not the product CLI (that's out of this crate's scope) — a
//! thin harness for manually poking at the two cores from a shell.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use lua_shroud::chunk::Chunk;
use lua_shroud::config::ShroudConfig;
use lua_shroud::constant::Constant;
use lua_shroud::rewriter::SourceRewriter;
use lua_shroud::serialize::ChunkSerializer;

#[derive(Parser)]
#[command(about = "Inspect lua-shroud's string rewriter and bytecode writer")]
struct Args {
    /// Lua source file to rewrite.
    #[arg(long)]
    source: Option<PathBuf>,

    /// TOML settings file providing a `ShroudConfig` (spec.md §6 option
    /// spelling: `EncryptStrings`, `EncryptImportantStrings`,
    /// `DecryptTableLen`). Overrides the individual flags below when given.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Encrypt every string literal found in --source.
    #[arg(long)]
    encrypt_all: bool,

    /// Encrypt string literals that look sensitive (http/function/etc).
    #[arg(long)]
    encrypt_important: bool,

    /// Upper bound on generated key-table length.
    #[arg(long, default_value_t = 32)]
    decrypt_table_len: usize,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Some(path) = &args.source {
        let source = fs::read_to_string(path).expect("failed to read --source file");
        let config = match &args.config {
            Some(config_path) => {
                let toml = fs::read_to_string(config_path).expect("failed to read --config file");
                ShroudConfig::from_toml_str(&toml).expect("invalid --config TOML")
            }
            None => ShroudConfig {
                encrypt_strings: args.encrypt_all,
                encrypt_important_strings: args.encrypt_important,
                decrypt_table_len: args.decrypt_table_len,
            },
        };
        let mut rewriter = SourceRewriter::new();
        match rewriter.rewrite(&source, &config) {
            Ok(rewritten) => println!("{}", rewritten),
            Err(e) => eprintln!("rewrite failed: {}", e),
        }
        return;
    }

    // No source given: emit a toy chunk and report its size, as a sanity
    // check that the bytecode writer is wired up correctly.
    let mut chunk = Chunk::empty();
    let greeting = Constant::from_str("hello from lua-shroud").expect("greeting is Latin-1");
    chunk.constants.push(greeting);
    let serializer = ChunkSerializer::new();
    match serializer.write_chunk(&mut chunk) {
        Ok(bytes) => println!("wrote {} bytes of obfuscated bytecode", bytes.len()),
        Err(e) => eprintln!("serialize failed: {}", e),
    }
}
