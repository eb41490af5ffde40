//! nuvm-vm : chargement et exécution de modules nuvm
//!
//! Fournit :
//! - `Module` : table des globales + code, point d'entrée
//! - `load_module` / `read_module` : lecture du format binaire little-endian
//! - `Evaluator` : boucle fetch/decode/execute, pile de frames à en-tête de 3 slots
//! - `Natives` : primitives natives liées par nom (`fixnum.add`, `value.print`…)
//! - `disassemble_module`, `ModuleSummary` : inspection (résumé sérialisable avec `serde`)
//!
//! ```
//! use nuvm_vm::{load_module, Evaluator};
//!
//! // 1 global (procédure, entry 0, 1 local), 6 octets de code : load-i16 0 42 ; return 0
//! let bytes = [1, 0, 6, 0, 0, 0, 0x01, 0, 0, 0, 0, 1, 1, 6, 0, 0x02, 0, 42, 0, 0x06, 0];
//! let mut module = load_module(&bytes).unwrap();
//! let mut ev = Evaluator::new();
//! ev.prepare(&mut module).unwrap();
//! ev.run().unwrap();
//! assert_eq!(ev.return_value().as_fixnum(), Some(42));
//! ```

#![deny(missing_docs)]

/* ─────────────────────────── Modules publics ─────────────────────────── */

pub mod disasm;
pub mod evaluator;
pub mod frame;
pub mod loader;
pub mod module;
pub mod natives;

pub use disasm::{disassemble_module, GlobalSummary, ModuleSummary};
pub use evaluator::{Evaluator, EvaluatorOptions};
pub use loader::{load_module, read_global, read_module};
pub use module::Module;
pub use natives::{make_primitive, NativeEntry, Natives};
