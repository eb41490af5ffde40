//! nuvm-cli : bibliothèque interne du binaire `nuvm`
//!
//! Le parsing d'arguments reste dans `main.rs` ; ici :
//! - les tâches (`asm`, `run`, `disasm`, `inspect`, `natives`) et leur exécution
//! - utilitaires d'E/S (stdin/stdout, écriture atomique, chrono)
//! - traces (`feature = "trace"`) et couleurs (`feature = "color"`) optionnelles

#![deny(unused_must_use)]

use std::{
    fs,
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use nuvm_core::Value;
use nuvm_vm::{disassemble_module, load_module, Evaluator, EvaluatorOptions, Module, ModuleSummary, Natives};

#[cfg(feature = "color")]
use owo_colors::OwoColorize;

/// Extension des sources assembleur.
pub const SOURCE_EXT: &str = "nasm";
/// Extension des modules binaires.
pub const MODULE_EXT: &str = "nuvm";

// ───────────────────────────── Types publics ─────────────────────────────

/// Commande haut-niveau (le parsing CLI reste dans main.rs).
#[derive(Clone, Debug)]
pub enum Command {
    /// Assembler une source vers un module binaire.
    Asm(AsmTask),
    /// Exécuter un module (ou une source, assemblée d'abord).
    Run(RunTask),
    /// Désassembler un module.
    Disasm(DisasmTask),
    /// Résumé d'un module (texte ou JSON).
    Inspect(InspectTask),
    /// Lister les natives disponibles pour `--bind`.
    Natives,
}

/// `nuvm asm`
#[derive(Clone, Debug, Default)]
pub struct AsmTask {
    /// Source (fichier ou stdin).
    pub input: Input,
    /// Destination du module.
    pub output: Output,
    /// Vérifier seulement, sans écrire.
    pub check: bool,
    /// Afficher le désassemblage du résultat.
    pub disasm: bool,
    /// Afficher le temps d'assemblage.
    pub time: bool,
}

/// `nuvm run`
#[derive(Clone, Debug, Default)]
pub struct RunTask {
    /// Programme à exécuter.
    pub program: Input,
    /// Options d'exécution.
    pub options: RunOptions,
    /// Afficher le temps d'exécution.
    pub time: bool,
}

/// Réglages d'une exécution.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Global d'entrée (sinon celui du module, 0).
    pub entry: Option<u16>,
    /// Globales remplacées par une native (`index`, `nom`).
    pub bindings: Vec<(usize, String)>,
    /// Limite de pas.
    pub max_steps: Option<u64>,
    /// Taille de pile (slots).
    pub stack_size: Option<usize>,
}

/// `nuvm disasm`
#[derive(Clone, Debug, Default)]
pub struct DisasmTask {
    /// Module (ou source).
    pub input: Input,
    /// Sortie texte.
    pub output: Output,
}

/// `nuvm inspect`
#[derive(Clone, Debug, Default)]
pub struct InspectTask {
    /// Module (ou source).
    pub input: Input,
    /// Sortie JSON.
    pub json: bool,
}

/// Entrée : fichier ou `-` (=stdin).
#[derive(Clone, Debug, Default)]
pub enum Input {
    /// Fichier.
    Path(PathBuf),
    /// Entrée standard.
    #[default]
    Stdin,
}

/// Sortie générique.
#[derive(Clone, Debug, Default)]
pub enum Output {
    /// Fichier.
    Path(PathBuf),
    /// Sortie standard.
    #[default]
    Stdout,
    /// Même nom que l'entrée + `.nuvm`.
    Auto,
}

// ───────────────────────────── Initialisation ─────────────────────────────

/// Initialise le logger selon la feature `trace`.
pub fn init_logger() {
    #[cfg(feature = "trace")]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .try_init();
    }
}

// ───────────────────────────── Exécution ─────────────────────────────

/// Exécute une commande. Retourne un code de sortie.
pub fn execute(cmd: Command) -> Result<i32> {
    match cmd {
        Command::Asm(t) => asm_entry(&t),
        Command::Run(t) => run_entry(&t),
        Command::Disasm(t) => {
            let module = read_module_input(&t.input)?;
            write_output(&t.output, None, disassemble_module(&module).as_bytes())?;
            Ok(0)
        }
        Command::Inspect(t) => {
            let module = read_module_input(&t.input)?;
            write_stdout(inspect_module(&module, t.json)?.as_bytes())?;
            Ok(0)
        }
        Command::Natives => {
            let natives = Natives::with_defaults();
            let mut text = String::new();
            for name in natives.names() {
                let arity = natives.entry(name).and_then(|e| e.arity).map_or_else(|| "*".to_owned(), |n| n.to_string());
                text.push_str(&format!("{name:<14} {arity}\n"));
            }
            write_stdout(text.as_bytes())?;
            Ok(0)
        }
    }
}

fn asm_entry(task: &AsmTask) -> Result<i32> {
    let src = read_source(&task.input).context("lecture de la source")?;

    let start = Instant::now();
    let bytes = nuvm_asm::assemble(&src).with_context(|| format!("assemblage de {}", describe(&task.input)))?;
    let elapsed = start.elapsed();
    debug!("assemblé : {} octets", bytes.len());

    if task.disasm {
        let module = load_module(&bytes).context("relecture du module assemblé")?;
        write_stdout(disassemble_module(&module).as_bytes())?;
    }
    if task.check {
        status_ok("CHECK", &describe(&task.input));
    } else if !(task.disasm && matches!(task.output, Output::Stdout)) {
        if let Some(path) = write_output(&task.output, Some(&task.input), &bytes)? {
            status_ok("ASM", &display(&path));
        }
    }
    if task.time {
        status_info("TIME", &format!("asm: {} ms", elapsed.as_millis()));
    }
    Ok(0)
}

fn run_entry(task: &RunTask) -> Result<i32> {
    let mut module = read_module_input(&task.program)?;

    let start = Instant::now();
    let value = run_module(&mut module, &task.options)?;
    let elapsed = start.elapsed();

    println!("{value}");
    status_ok("RUN", &describe(&task.program));
    if task.time {
        status_info("TIME", &format!("run: {} ms", elapsed.as_millis()));
    }
    Ok(0)
}

/// Bind natives, prepare, run; the result is the value returned by the entry procedure.
pub fn run_module(module: &mut Module, opts: &RunOptions) -> Result<Value> {
    if let Some(entry) = opts.entry {
        module.set_entry_point(entry).context("point d'entrée")?;
    }
    let natives = Natives::with_defaults();
    for (index, name) in &opts.bindings {
        let prim = natives.get(name)?;
        module.set_global(*index, prim).with_context(|| format!("liaison de {name} à la globale {index}"))?;
        debug!("globale {index} <- {name}");
    }

    let defaults = EvaluatorOptions::default();
    let mut ev = Evaluator::with_options(EvaluatorOptions {
        stack_size: opts.stack_size.unwrap_or(defaults.stack_size),
        step_limit: opts.max_steps,
        ..defaults
    });
    ev.prepare(module).context("préparation de l'évaluateur")?;
    ev.run().with_context(|| format!("exécution arrêtée à pc {}", ev.pc()))?;
    debug!("{} pas", ev.steps());
    Ok(ev.return_value())
}

/// Texte ou JSON (pretty-printed) décrivant `module`.
pub fn inspect_module(module: &Module, json: bool) -> Result<String> {
    let summary = ModuleSummary::of(module);
    if json {
        let mut s = serde_json::to_string_pretty(&summary)?;
        s.push('\n');
        return Ok(s);
    }
    let mut s = format!(
        "globals:     {}\ncode size:   {}\nentry point: {}\n",
        summary.num_globals, summary.code_size, summary.entry_point
    );
    for (i, g) in module.globals().iter().enumerate() {
        s.push_str(&format!("  [{i}] {g}\n"));
    }
    Ok(s)
}

/// `IDX=NAME`, pour `--bind`.
pub fn parse_binding(s: &str) -> Result<(usize, String)> {
    let (idx, name) = s.split_once('=').ok_or_else(|| anyhow!("attendu IDX=NAME, reçu `{s}`"))?;
    let idx = idx.trim().parse::<usize>().with_context(|| format!("index de globale invalide `{idx}`"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("nom de native vide dans `{s}`");
    }
    Ok((idx, name.to_owned()))
}

// ───────────────────────────── Utilitaires E/S ─────────────────────────────

/// Module binaire, ou source `.nasm` assemblée à la volée.
pub fn read_module_input(input: &Input) -> Result<Module> {
    let bytes = match input {
        Input::Path(p) if p.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXT) => {
            let src = read_source(input)?;
            nuvm_asm::assemble(&src).with_context(|| format!("assemblage de {}", display(p)))?
        }
        Input::Path(p) => fs::read(p).with_context(|| format!("lecture du module: {}", display(p)))?,
        Input::Stdin => {
            let mut b = Vec::new();
            io::stdin().read_to_end(&mut b)?;
            b
        }
    };
    load_module(&bytes).with_context(|| format!("chargement de {}", describe(input)))
}

fn read_source(input: &Input) -> Result<String> {
    match input {
        Input::Stdin => {
            let mut s = String::new();
            io::stdin().read_to_string(&mut s)?;
            Ok(s)
        }
        Input::Path(p) => fs::read_to_string(p).with_context(|| format!("ouverture: {}", display(p))),
    }
}

/// Écrit `bytes` ; rend le chemin écrit (None pour stdout).
fn write_output(output: &Output, input: Option<&Input>, bytes: &[u8]) -> Result<Option<PathBuf>> {
    let path = match (output, input) {
        (Output::Stdout, _) => {
            write_stdout(bytes)?;
            return Ok(None);
        }
        (Output::Path(p), _) => p.clone(),
        (Output::Auto, Some(Input::Path(p))) => default_module_path(p),
        (Output::Auto, _) => PathBuf::from(format!("out.{MODULE_EXT}")),
    };
    write_bytes_atomic(&path, bytes).with_context(|| format!("écriture de {}", display(&path)))?;
    Ok(Some(path))
}

fn write_stdout(bytes: &[u8]) -> Result<()> {
    let mut w = BufWriter::new(io::stdout().lock());
    w.write_all(bytes)?;
    w.flush()?;
    Ok(())
}

/// Écriture via un fichier temporaire voisin puis `rename`.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let base = path.file_name().ok_or_else(|| anyhow!("chemin de sortie sans nom: {}", display(path)))?;
    let tmp = unique_tmp_path(parent, base);
    {
        let mut w = BufWriter::new(File::create(&tmp)?);
        w.write_all(bytes)?;
        w.flush()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("remplacement de {}", display(path)));
    }
    Ok(())
}

fn unique_tmp_path(dir: &Path, base: &std::ffi::OsStr) -> PathBuf {
    let mut i = 0u32;
    loop {
        let candidate = dir.join(format!("{}.tmp{i}", base.to_string_lossy()));
        if !candidate.exists() {
            return candidate;
        }
        i = i.wrapping_add(1);
    }
}

/// `prog.nasm` → `prog.nuvm`, même dossier.
pub fn default_module_path(src: &Path) -> PathBuf { src.with_extension(MODULE_EXT) }

fn describe(input: &Input) -> String {
    match input {
        Input::Path(p) => display(p),
        Input::Stdin => "<stdin>".to_owned(),
    }
}

fn display(p: &Path) -> String { p.to_string_lossy().to_string() }

// ───────────────────────────── Sorties jolies ─────────────────────────────

fn status_ok(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    eprintln!("{} {msg}", tag.green().bold());
    #[cfg(not(feature = "color"))]
    eprintln!("{tag} {msg}");
}

fn status_info(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    eprintln!("{} {msg}", tag.blue().bold());
    #[cfg(not(feature = "color"))]
    eprintln!("{tag} {msg}");
}

// ───────────────────────────── Tests ─────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings() {
        assert_eq!(parse_binding("3=fixnum.add").unwrap(), (3, "fixnum.add".to_owned()));
        assert_eq!(parse_binding(" 0 = value.print ").unwrap(), (0, "value.print".to_owned()));
        assert!(parse_binding("fixnum.add").is_err());
        assert!(parse_binding("x=fixnum.add").is_err());
        assert!(parse_binding("1=").is_err());
    }

    #[test]
    fn default_paths() {
        let out = default_module_path(Path::new("src/main.nasm"));
        assert_eq!(out, PathBuf::from("src/main.nuvm"));
    }

    #[test]
    fn run_module_binds_and_overrides_entry() {
        let bytes = nuvm_asm::assemble(
            ".fixnum32 0
             .procedure 3 3 {
                global-ref 1 0
                load-i16 2 21
                call 0 1 2 2 2
                return 0
             }",
        )
        .unwrap();
        let mut module = load_module(&bytes).unwrap();
        let opts = RunOptions { entry: Some(1), bindings: vec![(0, "fixnum.add".to_owned())], ..RunOptions::default() };
        assert_eq!(run_module(&mut module, &opts).unwrap().as_fixnum(), Some(42));
    }

    #[test]
    fn unknown_native_is_reported() {
        let mut module = Module::with_sizes(1, 0);
        let opts = RunOptions { bindings: vec![(0, "nope.nope".to_owned())], ..RunOptions::default() };
        let err = run_module(&mut module, &opts).unwrap_err();
        assert!(format!("{err:#}").contains("nope.nope"));
    }
}
