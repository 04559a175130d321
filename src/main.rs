//! Command-line interface for yangtree

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(author, version, about = "YANG schema and data tree tool", long_about = None)]
struct Args {
    /// Schema files to load, .yang or .yin
    #[arg(value_name = "SCHEMA")]
    schemas: Vec<std::path::PathBuf>,

    /// Directory searched for imported modules, repeatable
    #[arg(short = 'p', long = "searchpath")]
    searchpaths: Vec<std::path::PathBuf>,

    /// Enable a feature as module:feature or module:*, repeatable
    #[arg(short = 'e', long = "feature-enable", value_name = "MOD:FEAT")]
    enable: Vec<String>,

    /// Disable a feature as module:feature or module:*, repeatable
    #[arg(short = 'd', long = "feature-disable", value_name = "MOD:FEAT")]
    disable: Vec<String>,

    /// Print the named module in YIN format
    #[arg(long = "print", value_name = "MODULE")]
    print: Option<String>,

    /// Validate a data XML file against the loaded schemas
    #[arg(long = "data", value_name = "FILE")]
    data: Option<std::path::PathBuf>,

    /// Validate an edit-config XML file, state data rejected
    #[arg(long = "config", value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    /// Parse a NETCONF filter XML file, duplicates merge
    #[arg(long = "filter", value_name = "FILE")]
    filter: Option<std::path::PathBuf>,

    /// Check the syntax of an XPath expression
    #[arg(long = "xpath", value_name = "EXPR")]
    xpath: Option<String>,

    /// Reject unknown elements in data files
    #[arg(long = "strict")]
    strict: bool,

    /// Print parsed data trees back as XML
    #[arg(short = 'o', long = "output")]
    output: bool,
}

#[cfg(feature = "cli")]
fn run(args: &Args) -> yangtree::Result<()> {
    use yangtree::{options, Context, SchemaFormat};

    let mut ctx = Context::new(args.searchpaths.clone());

    for path in &args.schemas {
        let format = SchemaFormat::from_path(path).ok_or_else(|| {
            yangtree::Error::Internal(format!(
                "cannot tell the schema format of {}",
                path.display()
            ))
        })?;
        let source = std::fs::read_to_string(path)?;
        ctx.parse_module(&source, format)?;
    }

    for (spec, enable) in args
        .enable
        .iter()
        .map(|s| (s, true))
        .chain(args.disable.iter().map(|s| (s, false)))
    {
        let (module, feature) = spec.split_once(':').ok_or_else(|| {
            yangtree::Error::Internal(format!("feature spec \"{}\" is not module:feature", spec))
        })?;
        let mid = ctx.get_module(module, None).ok_or_else(|| {
            yangtree::Error::Internal(format!("module \"{}\" is not loaded", module))
        })?;
        if enable {
            ctx.feature_enable(mid, feature)?;
        } else {
            ctx.feature_disable(mid, feature)?;
        }
    }

    if let Some(expr) = &args.xpath {
        yangtree::xpath::syntax_check(expr, 0)?;
        println!("xpath ok: {}", expr);
    }

    if let Some(name) = &args.print {
        let mid = ctx.get_module(name, None).ok_or_else(|| {
            yangtree::Error::Internal(format!("module \"{}\" is not loaded", name))
        })?;
        print!("{}", ctx.print_module(mid));
    }

    let strict = if args.strict { options::STRICT } else { 0 };
    for (path, opts) in [
        (&args.data, strict),
        (&args.config, strict | options::EDIT),
        (&args.filter, options::FILTER),
    ] {
        if let Some(path) = path {
            let source = std::fs::read_to_string(path)?;
            let tree = ctx.parse_data(&source, opts)?;
            if args.output {
                print!("{}", ctx.print_data(&tree));
            }
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("yangtree: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
