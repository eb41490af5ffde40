//! Inspection d'un module chargé : listing texte et résumé sérialisable.

use core::fmt::Write;

use nuvm_core::disasm::disassemble_range;
use nuvm_core::Value;

use crate::module::Module;

/// Description of one global.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum GlobalSummary {
    /// Fixnum immédiat.
    Fixnum32 {
        /// Valeur.
        value: i32,
    },
    /// Procédure utilisateur.
    Procedure {
        /// Offset d'entrée.
        entry: u32,
        /// Locaux garantis.
        num_locals: u8,
        /// Borne locaux + arguments.
        max_locals: u8,
        /// Taille du code.
        size: u16,
    },
    /// Autre objet (booléen, primitive liée…), par nom de type.
    Object {
        /// Nom du type.
        type_name: String,
    },
}

impl From<&Value> for GlobalSummary {
    fn from(v: &Value) -> Self {
        if let Some(value) = v.as_fixnum() {
            Self::Fixnum32 { value }
        } else if let Some(p) = v.as_procedure() {
            Self::Procedure { entry: p.entry, num_locals: p.num_locals, max_locals: p.max_locals, size: p.size }
        } else {
            Self::Object { type_name: v.type_of().name().to_owned() }
        }
    }
}

/// Header and globals of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModuleSummary {
    /// Nombre de globales.
    pub num_globals: usize,
    /// Taille du code.
    pub code_size: usize,
    /// Global d'entrée.
    pub entry_point: u16,
    /// Globales, dans l'ordre.
    pub globals: Vec<GlobalSummary>,
}

impl ModuleSummary {
    /// Résumé de `module`.
    pub fn of(module: &Module) -> Self {
        Self {
            num_globals: module.num_globals(),
            code_size: module.code().len(),
            entry_point: module.entry_point(),
            globals: module.globals().iter().map(GlobalSummary::from).collect(),
        }
    }
}

/// Full listing: header, globals table, then the code of each procedure in entry order.
///
/// A module without procedures gets a flat listing of its whole code.
pub fn disassemble_module(module: &Module) -> String {
    let mut out = String::new();
    let code = module.code();
    let _ = writeln!(
        out,
        "; module: {} globals, {} bytes of code, entry {}",
        module.num_globals(),
        code.len(),
        module.entry_point()
    );

    out.push_str("; globals\n");
    for (i, g) in module.globals().iter().enumerate() {
        let _ = writeln!(out, ";   {i:>3}  {g}");
    }

    let mut procs: Vec<_> =
        module.globals().iter().enumerate().filter_map(|(i, g)| g.as_procedure().map(|p| (i, p))).collect();
    procs.sort_by_key(|(i, p)| (p.entry, *i));

    if procs.is_empty() {
        if !code.is_empty() {
            out.push_str("; code\n");
            disassemble_range(code, 0, code.len(), &mut out);
        }
        return out;
    }
    for (i, p) in procs {
        let start = p.entry as usize;
        let end = start + usize::from(p.size);
        let _ = writeln!(out, "; procedure {i} [{start:04}..{end:04})");
        disassemble_range(code, start, end, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuvm_core::{true_value, Procedure};
    use pretty_assertions::assert_eq;

    fn sample() -> Module {
        let globals = vec![
            Value::Fixnum(-7),
            Value::procedure(Procedure { entry: 0, num_locals: 1, max_locals: 3, size: 6 }),
            true_value(),
        ];
        // load-i16 0 5 ; return 0
        Module::new(globals, vec![0x02, 0, 5, 0, 0x06, 0])
    }

    #[test]
    fn listing() {
        assert_eq!(
            disassemble_module(&sample()),
            "; module: 3 globals, 6 bytes of code, entry 0\n\
             ; globals\n\
             ;     0  -7\n\
             ;     1  #<procedure entry=0 locals=1 max=3 size=6>\n\
             ;     2  #true\n\
             ; procedure 1 [0000..0006)\n\
             0000: load-i16 0 5\n\
             0004: return 0\n"
        );
    }

    #[test]
    fn flat_listing_without_procedures() {
        let m = Module::new(vec![], vec![0x00, 0x01]);
        assert!(disassemble_module(&m).ends_with("; code\n0000: nop\n0001: halt\n"));
    }

    #[test]
    fn summary_describes_globals() {
        let s = ModuleSummary::of(&sample());
        assert_eq!(s.num_globals, 3);
        assert_eq!(s.code_size, 6);
        assert_eq!(s.globals[0], GlobalSummary::Fixnum32 { value: -7 });
        assert_eq!(s.globals[1], GlobalSummary::Procedure { entry: 0, num_locals: 1, max_locals: 3, size: 6 });
        assert!(matches!(&s.globals[2], GlobalSummary::Object { type_name } if type_name == "nuvm.Boolean"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn summary_serializes_with_a_kind_tag() {
        let json = serde_json::to_value(ModuleSummary::of(&sample())).unwrap();
        assert_eq!(json["entry_point"], 0);
        assert_eq!(json["globals"][0]["kind"], "fixnum32");
        assert_eq!(json["globals"][1]["max_locals"], 3);
    }
}
