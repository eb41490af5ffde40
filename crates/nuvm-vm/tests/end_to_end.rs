use nuvm_asm::{assemble, ProtoProcedure, ProtoValue};
use nuvm_core::{ByteReader, ByteWriter, ErrorKind, Procedure, Result};
use nuvm_vm::{disassemble_module, load_module, read_global, Evaluator, EvaluatorOptions, Module, Natives};
use pretty_assertions::assert_eq;

fn load(src: &str) -> Module { load_module(&assemble(src).unwrap()).unwrap() }

fn bind(m: &mut Module, index: usize, name: &str) {
    m.set_global(index, Natives::with_defaults().get(name).unwrap()).unwrap();
}

#[test]
fn loads_the_sample_module() -> Result<()> {
    let bytes = [
        0x02, 0x00, // num_globals
        0x0A, 0x00, 0x00, 0x00, // code_size
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, // procedure
        0x00, 0xFF, 0xFF, 0xFF, 0x7F, // fixnum32
        0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A,
    ];
    let m = load_module(&bytes)?;
    assert_eq!(m.num_globals(), 2);
    assert_eq!(
        m.get_global(0)?.as_procedure(),
        Some(Procedure { entry: 0x0504_0302, num_locals: 6, max_locals: 7, size: 0x0908 })
    );
    assert_eq!(m.get_global(1)?.as_fixnum(), Some(0x7FFF_FFFF));
    assert_eq!(m.code(), (0x81..=0x8A).collect::<Vec<u8>>());
    Ok(())
}

#[test]
fn declarations_read_back_as_emitted() -> Result<()> {
    for v in [i32::MIN, -1, 0, 1, i32::MAX] {
        let mut w = ByteWriter::in_memory();
        ProtoValue::Fixnum32(v).emit_declaration(&mut w, 0)?;
        let bytes = w.into_inner();
        let mut r = ByteReader::from_slice(&bytes);
        assert_eq!(read_global(&mut r)?.as_fixnum(), Some(v));
        assert!(!r.has_data()?);
    }

    let mut p = ProtoProcedure::new(2, 9);
    p.add_load_i16(0, 5);
    p.add_return(0);
    p.resolve_anchors()?;
    let mut w = ByteWriter::in_memory();
    ProtoValue::from(p).emit_declaration(&mut w, u32::MAX)?;
    let bytes = w.into_inner();
    let proc = read_global(&mut ByteReader::from_slice(&bytes))?;
    assert_eq!(proc.as_procedure(), Some(Procedure { entry: u32::MAX, num_locals: 2, max_locals: 9, size: 6 }));
    Ok(())
}

#[test]
fn truncated_module_is_rejected() {
    let bytes = assemble(".procedure 0 0 { return 0 }").unwrap();
    let err = load_module(&bytes[..bytes.len() - 1]).unwrap_err();
    assert!(err.is(&ErrorKind::UnexpectedEof));
}

#[test]
fn runs_an_assembled_procedure() -> Result<()> {
    let mut m = load(
        ".procedure 1 1 {
            load-i16 0 -1234
            return 0
         }",
    );
    let mut ev = Evaluator::new();
    ev.prepare(&mut m)?;
    ev.run()?;
    assert!(ev.halted());
    assert_eq!(ev.return_value().as_fixnum(), Some(-1234));
    assert_eq!(ev.steps(), 2);
    Ok(())
}

#[test]
fn result_comes_from_the_returned_local() -> Result<()> {
    let mut m = load(
        ".procedure 2 2 {
            load-i16 0 7
            load-i16 1 99
            return 1
         }",
    );
    let mut ev = Evaluator::new();
    ev.prepare(&mut m)?;
    ev.run()?;
    assert_eq!(ev.return_value().as_fixnum(), Some(99));
    assert_eq!(ev.get_local(0)?.as_fixnum(), Some(7));
    Ok(())
}

#[test]
fn calls_a_user_procedure() -> Result<()> {
    let mut m = load(
        "; global 0 : point d'entrée
         .procedure 3 3 {
            global-ref 1 1
            load-i16 2 20
            call 0 1 1 2
            return 0
         }
         ; global 1 : double son argument (local 1)
         .procedure 1 2 {
            global-ref 0 2
            call 1 0 2 1 1
            return 1
         }
         .fixnum32 0",
    );
    bind(&mut m, 2, "fixnum.add");
    let mut ev = Evaluator::new();
    ev.prepare(&mut m)?;
    ev.run()?;
    assert_eq!(ev.return_value().as_fixnum(), Some(40));
    assert_eq!((ev.fp(), ev.sp()), (0, 6));
    Ok(())
}

#[test]
fn counts_with_a_loop_and_natives() -> Result<()> {
    let mut m = load(
        ".procedure 6 6 {
            global-ref 1 1
            global-ref 2 2
            load-i16 0 0
            load-i16 3 1
            load-i16 4 10
          top:
            call 5 1 2 0 4      ; i < 10
            jump-unless 5 @body
            return 0
          body:
            call 0 2 2 0 3      ; i = i + 1
            jump @top
         }
         .fixnum32 0
         .fixnum32 0",
    );
    bind(&mut m, 1, "fixnum.lt");
    bind(&mut m, 2, "fixnum.add");
    let mut ev = Evaluator::new();
    ev.prepare(&mut m)?;
    ev.run()?;
    assert_eq!(ev.return_value().as_fixnum(), Some(10));
    Ok(())
}

#[test]
fn global_set_is_visible_to_later_reads() -> Result<()> {
    let mut m = load(
        ".procedure 2 2 {
            load-i16 1 77
            global-set 1 1
            global-ref 0 1
            return 0
         }
         .fixnum32 0",
    );
    let mut ev = Evaluator::new();
    ev.prepare(&mut m)?;
    ev.run()?;
    assert_eq!(ev.return_value().as_fixnum(), Some(77));
    assert_eq!(ev.get_global(1)?.as_fixnum(), Some(77));
    drop(ev);
    assert_eq!(m.get_global(1)?.as_fixnum(), Some(77));
    Ok(())
}

#[test]
fn infinite_loop_hits_the_step_limit() {
    let mut m = load(".procedure 0 0 { top: jump @top }");
    let mut ev = Evaluator::with_options(EvaluatorOptions { step_limit: Some(1000), ..EvaluatorOptions::default() });
    ev.prepare(&mut m).unwrap();
    let err = ev.run().unwrap_err();
    assert!(err.is(&ErrorKind::Overflow));
    assert!(ev.halted());
    assert_eq!(ev.steps(), 1000);
}

#[test]
fn bad_opcode_halts_the_run() {
    let mut m = load(".procedure 0 0 { nop nop }");
    m.code_mut()[1] = 0xEE;
    let mut ev = Evaluator::new();
    ev.prepare(&mut m).unwrap();
    let err = ev.run().unwrap_err();
    assert!(err.is(&ErrorKind::UnknownOpcode));
    assert_eq!(ev.pc(), 1);
}

#[test]
fn native_errors_stop_the_evaluator() {
    let mut m = load(
        ".procedure 3 3 {
            global-ref 1 1
            load-i16 2 32767
            call 0 1 2 2 2
            call 0 1 2 0 0      ; déborde
            return 0
         }
         .fixnum32 0",
    );
    bind(&mut m, 1, "fixnum.mul");
    let mut ev = Evaluator::new();
    ev.prepare(&mut m).unwrap();
    let err = ev.run().unwrap_err();
    assert!(err.is(&ErrorKind::Overflow));
    assert!(ev.halted());
    assert_eq!(ev.pc(), 13);
    assert_eq!(ev.get_local(0).unwrap().as_fixnum(), Some(32767 * 32767));
    assert!(ev.return_value().is_unknown());
}

#[test]
fn disassembly_lists_each_procedure() {
    let m = load(
        ".procedure 0 0 { halt }
         .procedure 1 1 { load-i16 0 3 return 0 }",
    );
    let text = disassemble_module(&m);
    assert!(text.contains("; procedure 0 [0000..0001)\n0000: halt\n"));
    assert!(text.contains("; procedure 1 [0001..0007)\n0001: load-i16 0 3\n0005: return 0\n"));
}
