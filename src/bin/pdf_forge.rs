//! pdf_forge command line driver
//!
//! Usage:
//!   pdf_forge info <input>
//!   pdf_forge text <input> [page]
//!   pdf_forge rotate <input> <degrees> [pages...] -o <output>
//!   pdf_forge remove <input> <pages...> -o <output>
//!   pdf_forge merge <inputs...> -o <output>
//!   pdf_forge split <input> <page> -o <output>
//!   pdf_forge encrypt <input> <user-password> [owner-password] -o <output>
//!   pdf_forge compress <input> -o <output>
//!   pdf_forge images <input> -o <directory>
//!
//! `split` writes `<output>` with the pages before `<page + 1>` and a second
//! file with `-2` added to the output stem for the rest.
//!
//! Set `RUST_LOG=info` to see audit events.

use pdf_forge::content::{extract_page_text, extract_text, save_images};
use pdf_forge::editor::{merge_files, split, Operation};
use pdf_forge::encryption::{encrypt, EncryptionConfig};
use pdf_forge::writer::WriterConfig;
use pdf_forge::{Document, Error, Result};
use std::path::{Path, PathBuf};

struct Args {
    command: String,
    positional: Vec<String>,
    output: Option<PathBuf>,
}

impl Args {
    fn from_env() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut command = String::new();
        let mut positional = Vec::new();
        let mut output = None;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "-o" | "--output" => {
                    i += 1;
                    if i < args.len() {
                        output = Some(PathBuf::from(&args[i]));
                    }
                },
                arg if command.is_empty() => command = arg.to_string(),
                arg => positional.push(arg.to_string()),
            }
            i += 1;
        }

        Self {
            command,
            positional,
            output,
        }
    }

    fn input(&self) -> Result<&str> {
        self.positional
            .first()
            .map(String::as_str)
            .ok_or_else(|| usage("missing input file"))
    }

    fn output(&self) -> Result<&Path> {
        self.output.as_deref().ok_or_else(|| usage("missing -o <output>"))
    }
}

fn usage(reason: &str) -> Error {
    Error::InvalidArgument {
        operation: "cli",
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| usage(&format!("not a number: {}", value)))
}

fn parse_pages(values: &[String]) -> Result<Vec<usize>> {
    values.iter().map(|v| parse_number(v)).collect()
}

fn second_output(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{}-2.{}", stem, ext.to_string_lossy()),
        None => format!("{}-2", stem),
    };
    output.with_file_name(name)
}

fn info(doc: &Document) -> Result<()> {
    println!("Version:   {}", doc.version());
    println!("Pages:     {}", doc.page_count());
    println!("Encrypted: {}", doc.is_encrypted());
    let meta = doc.metadata();
    if let Some(title) = &meta.title {
        println!("Title:     {}", title);
    }
    if let Some(author) = &meta.author {
        println!("Author:    {}", author);
    }
    if let Some(producer) = &meta.producer {
        println!("Producer:  {}", producer);
    }
    for index in 1..=doc.page_count() {
        let page = doc.page_info(index)?;
        println!(
            "  page {:>4}: {:.1} x {:.1} pt, rotate {}",
            page.index, page.width, page.height, page.rotation
        );
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let writer = WriterConfig::default().with_producer(format!("pdf_forge {}", pdf_forge::VERSION));

    match args.command.as_str() {
        "info" => info(&Document::load(args.input()?)?),
        "text" => {
            let doc = Document::load(args.input()?)?;
            let text = match args.positional.get(1) {
                Some(page) => extract_page_text(&doc, parse_number(page)?)?,
                None => extract_text(&doc)?,
            };
            println!("{}", text);
            Ok(())
        },
        "rotate" => {
            let mut doc = Document::load(args.input()?)?;
            let degrees: i64 = parse_number(args.positional.get(1).ok_or_else(|| usage("missing degrees"))?)?;
            let mut pages = parse_pages(&args.positional[2..])?;
            if pages.is_empty() {
                pages = (1..=doc.page_count()).collect();
            }
            for position in pages {
                Operation::Rotate { position, degrees }.apply(&mut doc)?;
            }
            doc.save(args.output()?, &writer)
        },
        "remove" => {
            let mut doc = Document::load(args.input()?)?;
            let positions = parse_pages(&args.positional[1..])?;
            Operation::Remove { positions }.apply(&mut doc)?;
            doc.save(args.output()?, &writer)
        },
        "merge" => {
            if args.positional.is_empty() {
                return Err(usage("missing input files"));
            }
            merge_files(&args.positional)?.save(args.output()?, &writer)
        },
        "split" => {
            let doc = Document::load(args.input()?)?;
            let boundary = parse_number(args.positional.get(1).ok_or_else(|| usage("missing page"))?)?;
            let (first, second) = split(&doc, boundary)?;
            let output = args.output()?;
            first.save(output, &writer)?;
            second.save(second_output(output), &writer)
        },
        "encrypt" => {
            let doc = Document::load(args.input()?)?;
            let user = args.positional.get(1).ok_or_else(|| usage("missing password"))?;
            let owner = args.positional.get(2).cloned().unwrap_or_default();
            encrypt(&doc, &EncryptionConfig::new(user.as_str(), owner))?.save(args.output()?, &writer)
        },
        "compress" => {
            let doc = Document::load(args.input()?)?;
            doc.save(args.output()?, &writer.with_compress(true))
        },
        "images" => {
            let doc = Document::load(args.input()?)?;
            for path in save_images(&doc, args.output()?)? {
                println!("{}", path.display());
            }
            Ok(())
        },
        "" => Err(usage("missing command")),
        other => Err(usage(&format!("unknown command: {}", other))),
    }
}

fn main() {
    env_logger::init();

    let args = Args::from_env();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
