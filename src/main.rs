use std::{fs, path::PathBuf, process};

use clap::Parser;
use lworld_class_file::{ClassFile, ClassFileError};

#[derive(Parser)]
#[command(name = "lworld", about = "Checks value class attributes in class files")]
struct Cli {
    /// Only parse, skip the attribute legality rules
    #[arg(long)]
    no_validate: bool,
    /// Print nothing for classes that pass
    #[arg(short, long)]
    quiet: bool,
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() {
    pretty_env_logger::init();

    let cli = Cli::parse();

    let mut failed = false;
    for path in &cli.files {
        let class_file = fs::read(path)
            .map_err(ClassFileError::from)
            .and_then(|bytes| {
                if cli.no_validate {
                    ClassFile::parse(&bytes)
                } else {
                    ClassFile::load(&bytes)
                }
            });

        match class_file {
            Ok(class_file) if !cli.quiet => print_report(&class_file),
            Ok(_) => {}
            Err(e) => {
                log::error!("{}: {}", path.display(), e);
                failed = true;
            }
        }
    }

    if failed {
        process::exit(1);
    }
}

fn print_report(class_file: &ClassFile) {
    let name = class_file.class_name().unwrap_or("<invalid>");
    let kind = match (class_file.is_value_type(), class_file.is_abstract()) {
        (true, true) => "abstract value class",
        (true, false) => "value class",
        (false, _) => "identity class",
    };
    println!("{} ({})", name, kind);

    if let Ok(interfaces) = class_file.interface_names() {
        if !interfaces.is_empty() {
            println!("    Implements:       {}", interfaces.join(", "));
        }
    }

    if !class_file.preload_classes().is_empty() {
        println!("    Preload:          {}", class_file.preload_classes().join(", "));
    }
    if let Some(flags) = class_file.implicit_creation() {
        println!("    ImplicitCreation: {:?}", flags);
    }
    for field in class_file.fields.iter().filter(|f| f.is_null_restricted()) {
        println!("    NullRestricted:   {} {}", field.name, field.field_type);
    }
}
