//! `nuvm` : CLI principal
//!
//! Ici uniquement : parsing d'arguments, initialisation (logger, couleur), et
//! délégation à `nuvm_cli` (lib).

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use nuvm_cli as cli;

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "nuvm", version, about = "nuvm : assembler, exécuter, désassembler, inspecter des modules", long_about = None)]
struct Opt {
    /// Augmente la verbosité (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux (casse la verbosité)
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    quiet: bool,

    /// Force la couleur (si la feature `color` est compilée)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Assembler une source vers un module binaire
    Asm {
        /// Source (.nasm, ou - pour stdin)
        input: Option<PathBuf>,
        /// Module de sortie (défaut : même nom + .nuvm, stdout pour stdin)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Vérifier seulement
        #[arg(long)]
        check: bool,
        /// Afficher le désassemblage du résultat
        #[arg(long)]
        disasm: bool,
        /// Afficher le temps d'assemblage
        #[arg(long)]
        time: bool,
    },

    /// Exécuter un module (une source .nasm est assemblée d'abord)
    Run {
        /// Module (.nuvm) ou source (.nasm)
        program: Option<PathBuf>,
        /// Global d'entrée
        #[arg(long)]
        entry: Option<u16>,
        /// Lier une native à une globale : IDX=NAME (répétable)
        #[arg(long = "bind", value_name = "IDX=NAME", value_parser = parse_binding)]
        bindings: Vec<(usize, String)>,
        /// Limite de pas
        #[arg(long = "max-steps")]
        max_steps: Option<u64>,
        /// Taille de pile en slots
        #[arg(long = "stack-size")]
        stack_size: Option<usize>,
        /// Afficher le temps d'exécution
        #[arg(long)]
        time: bool,
    },

    /// Désassembler un module
    Disasm {
        /// Module (ou source .nasm)
        input: Option<PathBuf>,
        /// Sortie texte (stdout si omis)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Résumé d'un module
    Inspect {
        /// Module (ou source .nasm)
        input: Option<PathBuf>,
        /// Sortie JSON
        #[arg(long)]
        json: bool,
    },

    /// Lister les natives liables avec --bind
    Natives,
}

fn parse_binding(s: &str) -> Result<(usize, String), String> { cli::parse_binding(s).map_err(|e| format!("{e:#}")) }

// ──────────────────────────── Entrée / Sortie ────────────────────────────

fn input_from_opt(p: Option<PathBuf>) -> cli::Input {
    match p {
        Some(path) if path.as_os_str() == "-" => cli::Input::Stdin,
        Some(path) => cli::Input::Path(path),
        None => cli::Input::Stdin,
    }
}

fn output_from_opt(output: Option<PathBuf>, input: &cli::Input, auto: bool) -> cli::Output {
    match (output, input) {
        (Some(p), _) => cli::Output::Path(p),
        (None, cli::Input::Path(_)) if auto => cli::Output::Auto,
        (None, _) => cli::Output::Stdout,
    }
}

// ──────────────────────────── Logger / Verbosité ────────────────────────────

fn init_telemetry(verbose: u8, quiet: bool) {
    #[cfg(feature = "trace")]
    {
        let level = if quiet {
            "error"
        } else {
            match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        };
        std::env::set_var("RUST_LOG", std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_owned()));
        cli::init_logger();
    }
    #[cfg(not(feature = "trace"))]
    let _ = (verbose, quiet);
}

fn init_color(choice: ColorChoice) {
    // owo-colors détecte le TTY ; on force via les variables d'env usuelles
    match choice {
        ColorChoice::Auto => {}
        ColorChoice::Always => {
            std::env::set_var("CLICOLOR_FORCE", "1");
            std::env::remove_var("NO_COLOR");
        }
        ColorChoice::Never => {
            std::env::set_var("NO_COLOR", "1");
            std::env::remove_var("CLICOLOR_FORCE");
        }
    }
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    match real_main() {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn real_main() -> Result<i32> {
    let opt = Opt::parse();

    init_color(opt.color);
    init_telemetry(opt.verbose, opt.quiet);

    let command = match opt.cmd {
        Command::Asm { input, output, check, disasm, time } => {
            let input = input_from_opt(input);
            let output = output_from_opt(output, &input, true);
            cli::Command::Asm(cli::AsmTask { input, output, check, disasm, time })
        }
        Command::Run { program, entry, bindings, max_steps, stack_size, time } => cli::Command::Run(cli::RunTask {
            program: input_from_opt(program),
            options: cli::RunOptions { entry, bindings, max_steps, stack_size },
            time,
        }),
        Command::Disasm { input, output } => {
            let input = input_from_opt(input);
            let output = output_from_opt(output, &input, false);
            cli::Command::Disasm(cli::DisasmTask { input, output })
        }
        Command::Inspect { input, json } => cli::Command::Inspect(cli::InspectTask { input: input_from_opt(input), json }),
        Command::Natives => cli::Command::Natives,
    };

    cli::execute(command).context("échec d'exécution de la commande")
}
