//! Quill CLI entry point.

mod literal;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rhizome_quill_codegen::{Codegen, TypedValue, ValueType};
use rhizome_quill_ir::InstructionSequence;
use rhizome_quill_runtime_stackvm::Machine;
use rhizome_quill_schema::Schema;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Field accessor and message construction generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate every accessor and construction a schema allows
    Check {
        /// Schema file (TOML)
        schema: PathBuf,
    },

    /// Print the accessor for one field
    Access {
        /// Schema file (TOML)
        schema: PathBuf,

        /// Full message name
        message: String,

        /// Field or extension name
        field: String,

        /// Take the message as a boxed host value
        #[arg(long)]
        boxed: bool,

        /// Print the sequence as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print (and optionally run) a message construction
    Construct {
        /// Schema file (TOML)
        schema: PathBuf,

        /// Full message name
        message: String,

        /// Field assignment, repeatable
        #[arg(short, long = "arg", value_name = "FIELD=LITERAL")]
        args: Vec<String>,

        /// Run the construction and read the assigned fields back
        #[arg(long)]
        run: bool,

        /// Print the sequence as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("quill=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { schema } => {
            let schema = Schema::from_file(&schema)?;
            let codegen = Codegen::new(&schema);
            let mut messages = 0;
            let mut fields = 0;
            for message in schema.messages() {
                let name = message.full_name.as_str();
                codegen.construct(name, Vec::new())?;
                let extensions = schema.extensions_of(name);
                for field in message.fields.iter().chain(extensions) {
                    codegen.field_access(name, message_input(name, false)?, &field.name)?;
                    fields += 1;
                }
                messages += 1;
            }
            info!(messages, fields, "schema checked");
            println!("ok: {} messages, {} field accessors", messages, fields);
        }

        Commands::Access {
            schema,
            message,
            field,
            boxed,
            json,
        } => {
            let schema = Schema::from_file(&schema)?;
            let base = message_input(&message, boxed)?;
            let value = Codegen::new(&schema).field_access(&message, base, &field)?;
            print_sequence(&value, json)?;
        }

        Commands::Construct {
            schema,
            message,
            args,
            run,
            json,
        } => {
            let schema = Schema::from_file(&schema)?;
            let codegen = Codegen::new(&schema);
            let mut fields = Vec::new();
            let mut parsed = Vec::new();
            for argument in &args {
                let (field, text) = literal::split_argument(argument)?;
                parsed.push((
                    field.to_string(),
                    literal::parse_argument(&schema, &message, field, text)?,
                ));
                if !fields.iter().any(|seen| seen == field) {
                    fields.push(field.to_string());
                }
            }
            let value = codegen.construct(&message, parsed)?;
            print_sequence(&value, json)?;

            if run {
                let mut machine = Machine::new(&schema);
                let built = machine
                    .run(value.code(), Vec::new())?
                    .ok_or("construction produced no value")?;
                println!("=> {}", built);
                for field in fields {
                    let base = message_input(&message, false)?;
                    let access = codegen.field_access(&message, base, &field)?;
                    let read = machine
                        .run(access.code(), vec![built.clone()])?
                        .ok_or("accessor produced no value")?;
                    println!("{}: {} = {}", field, access.value_type(), read);
                }
                info!(suspensions = machine.suspensions(), "construction ran");
            }
        }
    }

    Ok(())
}

/// The message as a sequence input.
fn message_input(message: &str, boxed: bool) -> Result<TypedValue, Box<dyn std::error::Error>> {
    Ok(TypedValue::input(
        ValueType::Message(message.to_string()),
        boxed,
        false,
    )?)
}

fn print_sequence(value: &TypedValue, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let code: &InstructionSequence = value.code();
    if json {
        println!("{}", serde_json::to_string_pretty(code)?);
    } else {
        println!("; value type {}", value.value_type());
        print!("{}", code);
    }
    Ok(())
}
