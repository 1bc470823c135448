use super::*;

use crate::arch::{flag, Mnemonic};
use crate::assembler::{assemble};

fn processor(source: &str) -> Processor {
    Processor::new(&assemble(source).unwrap())
}

fn shared(source: &str) -> Rc<RefCell<Processor>> {
    Rc::new(RefCell::new(processor(source)))
}

fn connect(a: &Rc<RefCell<Processor>>, port_a: PortId, b: &Rc<RefCell<Processor>>, port_b: PortId) -> Rc<PortConnection> {
    let a: DeviceRef = a.clone();
    let b: DeviceRef = b.clone();
    PortConnection::connect(&a, port_a, &b, port_b)
}

#[test]
fn add() {
    let mut p = processor("mov r0, 5\nmov r1, 10\nadd r0, r1\nhlt");
    p.set_cycles(usize::MAX);
    p.run();
    assert!(p.is_complete());
    assert_eq!(p.registers().general[0], 15);
    assert_eq!(p.registers().general[1], 10);
    assert_eq!(p.registers().flags & (flag::Z | flag::C), 0);
    // `add r0, r1` is two bytes.
    assert_eq!(p.registers().pc, 8);
}

#[test]
fn define() {
    let mut p = processor(".define FOO 42\nmov r0, FOO\nhlt");
    p.set_cycles(100);
    p.run();
    assert_eq!(p.registers().general[0], 42);
}

#[test]
fn unresolved() {
    assert!(assemble("mov r0, undefined_label").is_err());
}

#[test]
fn exchange() {
    let a = shared("send r0, r1, [0]\nhlt");
    let b = shared("recv r1, [0]\nhlt");
    a.borrow_mut().set_registers(Registers {general: [1, 1, 0, 0], ..Registers::default()});
    b.borrow_mut().set_registers(Registers {general: [0, 2, 0, 0], ..Registers::default()});
    let connection = connect(&a, 1, &b, 2);
    assert!(connection.is_connected());
    let expected = a.borrow().memory()[0];
    for p in [&a, &b] {
        p.borrow_mut().set_cycles(100);
    }
    // `a` waits for `b`, then `b` completes the handshake, then `a` continues.
    for _ in 0..3 {
        for p in [&a, &b] {
            let mut p = p.borrow_mut();
            if !p.is_complete() { p.run(); }
        }
    }
    let (a, b) = (a.borrow(), b.borrow());
    assert_eq!(b.memory()[0], expected);
    assert!(a.is_complete() && b.is_complete());
    assert_eq!(*a.message(), Message::Idle);
    assert_eq!(*b.message(), Message::Idle);
    // Both are on their `hlt`.
    assert_eq!(a.memory()[a.registers().pc as usize], 0xC0);
    assert_eq!(b.memory()[b.registers().pc as usize], 0xC0);
}

#[test]
fn handshake_aligns_clocks() {
    let a = shared("send 1, 1, [0]\nhlt");
    let b = shared("nop\nnop\nrecv 2, [9]\nhlt");
    connect(&a, 1, &b, 2);
    a.borrow_mut().set_cycles(100);
    b.borrow_mut().set_cycles(100);
    a.borrow_mut().run();
    assert!(matches!(a.borrow().message(), Message::Posted {..}));
    b.borrow_mut().run();
    a.borrow_mut().run();
    let (a, b) = (a.borrow(), b.borrow());
    assert!(a.is_complete() && b.is_complete());
    // The clocks met at the earlier time, then each ran a `hlt`.
    assert_eq!(a.cycles(), b.cycles());
}

#[test]
fn handshake_window() {
    for nops in 0..14 {
        let a = shared("send 1, 1, [0]\nhlt");
        let b = shared(&format!("{}recv 2, [200]\nhlt", "nop\n".repeat(nops)));
        connect(&a, 1, &b, 2);
        a.borrow_mut().set_cycles(100);
        b.borrow_mut().set_cycles(100);
        a.borrow_mut().run();
        b.borrow_mut().run();
        a.borrow_mut().run();
        let (a, b) = (a.borrow(), b.borrow());
        let b_pc = b.registers().pc;
        if nops <= 9 {
            assert_eq!(b.memory()[200], a.memory()[0], "{} nops", nops);
            assert_eq!(b.memory()[b_pc as usize], 0xC0, "{} nops", nops);
            assert_eq!(a.cycles(), b.cycles(), "{} nops", nops);
        } else {
            // Too far apart: `a` gave up and `b` is still waiting.
            assert_eq!(a.registers().pc, 0, "{} nops", nops);
            assert_eq!(a.cycles(), 100, "{} nops", nops);
            assert_eq!(b.memory()[200], 0, "{} nops", nops);
            let waiting = Instruction::decode(b.memory(), b_pc).map(|i| i.mnemonic);
            assert_eq!(waiting, Some(Mnemonic::Recv), "{} nops", nops);
        }
    }
}

#[test]
fn cycle_budget() {
    let mut p = processor("mov r0, 1\nadd r0, 1\nadd r0, 1\nhlt");
    p.set_cycles(4);
    p.run();
    assert!(p.is_complete());
    assert_eq!(p.registers().general[0], 1);
    assert_eq!(p.registers().pc, 3);
    assert_eq!(p.cycles(), 1);
    // Resumes at the same instruction.
    p.set_cycles(p.cycles() + 2);
    assert!(!p.is_complete());
    p.run();
    assert_eq!(p.registers().general[0], 2);
    assert_eq!(p.registers().pc, 6);
    assert_eq!(p.cycles(), 0);
}

#[test]
fn invalid_instruction() {
    let mut p = Processor::new(&Binary::from_bytes(&[0x33 << 2]));
    p.set_cycles(100);
    p.run();
    assert!(p.is_complete());
    assert_eq!(p.registers().pc, 0);
    assert_eq!(p.cycles(), 100);
}

#[test]
fn timeout() {
    // Nothing is connected to port 1.
    let mut p = processor("send 1, 1, [0]\nhlt");
    p.set_cycles(100);
    p.run();
    assert!(p.is_complete());
    assert_eq!(p.registers().pc, 0);
    assert!(p.cycles() < 4);
}

#[test]
fn self_connection() {
    let p = shared("send 1, 1, [0]\nhlt");
    let connection = connect(&p, 1, &p, 2);
    assert!(connection.is_connected());
    p.borrow_mut().set_cycles(100);
    p.borrow_mut().run();
    let p = p.borrow();
    assert!(p.is_complete());
    assert_eq!(p.registers().pc, 0);
}

#[test]
fn defer() {
    let a = shared("send 1, 1, [0]\nhlt");
    let b = shared("hlt");
    connect(&a, 1, &b, 2);
    b.borrow_mut().set_cycles(100);
    b.borrow_mut().run();
    a.borrow_mut().set_cycles(100);
    a.borrow_mut().run();
    let a = a.borrow();
    // The cost of the `send` was refunded.
    assert!(a.is_complete());
    assert_eq!(a.registers().pc, 0);
    assert_eq!(a.cycles(), 100);
}

#[test]
fn disconnect_twice() {
    let a = shared("hlt");
    let b = shared("hlt");
    let connection = connect(&a, 1, &b, 2);
    assert!(a.borrow().port(1).is_some());
    a.borrow_mut().disconnect(1);
    assert!(!connection.is_connected());
    assert!(a.borrow().port(1).is_none());
    assert!(b.borrow().port(2).is_none());
    a.borrow_mut().disconnect(1);
    b.borrow_mut().disconnect(2);
    connection.disconnect();
}

#[test]
fn dropping_disconnects() {
    let a = shared("hlt");
    let b = shared("hlt");
    let connection = connect(&a, 1, &b, 2);
    drop(a);
    assert!(!connection.is_connected());
    assert!(b.borrow().port(2).is_none());
}

#[test]
fn write_memory() {
    let mut p = processor("hlt");
    p.write_memory(7, 99);
    assert_eq!(p.memory()[7], 99);
}

//-----------------------------------------------------------------------------

#[derive(Default)]
struct Log(Rc<RefCell<Vec<String>>>);

impl DebugHooks for Log {
    fn operation(&mut self, offset: u8, _bytes: &[u8], instruction: &Instruction) {
        self.0.borrow_mut().push(format!("{}: {}", offset, instruction));
    }

    fn port_connection_change(&mut self, port: PortId, connected: bool) {
        self.0.borrow_mut().push(format!("port {} {}", port, connected));
    }

    fn breakpoint_change(&mut self, offset: u8, breakpoint: Breakpoint) {
        self.0.borrow_mut().push(format!("breakpoint {} {:?}", offset, breakpoint));
    }

    fn debug_mode_change(&mut self, mode: DebugMode) {
        self.0.borrow_mut().push(format!("mode {:?}", mode));
    }
}

#[test]
fn pause() {
    let mut p = processor("mov r0, 1\nhlt");
    p.set_debug_mode(DebugMode::Pause);
    p.set_cycles(100);
    p.run();
    assert!(p.is_complete());
    assert_eq!(p.registers().pc, 0);
    assert_eq!(p.cycles(), 100);
}

#[test]
fn step() {
    let mut p = processor("mov r0, 1\nmov r1, 2\nhlt");
    p.set_debug_mode(DebugMode::Pause);
    p.set_cycles(100);
    p.set_debug_mode(DebugMode::Step);
    p.run();
    assert_eq!(p.registers().general, [1, 0, 0, 0]);
    assert_eq!(p.debugger().map(Debugger::mode), Some(DebugMode::Pause));
    p.set_debug_mode(DebugMode::Step);
    p.run();
    assert_eq!(p.registers().general, [1, 2, 0, 0]);
    p.set_debug_mode(DebugMode::Continue);
    p.run();
    assert_eq!(p.registers().pc, 6);
}

#[test]
fn breakpoints() {
    let binary = assemble("mov r0, 1\nmov [data], r0\nhlt\ndata: .byte 0").unwrap();
    let data = binary.data.iter().rposition(|&x| x == 0xC0).unwrap() as u8 + 1;
    let mut p = Processor::new(&binary);
    p.set_breakpoint(data, Breakpoint::WRITE);
    p.set_cycles(100);
    p.run();
    // Stopped before the store.
    assert_eq!(p.registers().pc, 3);
    assert_eq!(p.memory()[data as usize], 0);
    assert_eq!(p.debugger().map(Debugger::mode), Some(DebugMode::Pause));
    p.set_debug_mode(DebugMode::Continue);
    p.run();
    assert_eq!(p.memory()[data as usize], 1);
    assert_eq!(p.memory()[p.registers().pc as usize], 0xC0);
    // Reads do not trigger a write breakpoint.
    let mut q = processor("mov r0, [9]\nhlt");
    q.set_breakpoint(9, Breakpoint::WRITE);
    q.set_cycles(100);
    q.run();
    assert_eq!(q.debugger().map(Debugger::mode), Some(DebugMode::Continue));
}

#[test]
fn hooks() {
    let log = Log::default();
    let lines = log.0.clone();
    let a = shared("mov r0, 7\nhlt");
    a.borrow_mut().set_debugger(Some(Debugger::with_hooks(DebugMode::Continue, Box::new(log))));
    let b = shared("hlt");
    let connection = connect(&a, 1, &b, 2);
    a.borrow_mut().set_breakpoint(200, Breakpoint::READ);
    a.borrow_mut().set_breakpoint(200, Breakpoint::NONE);
    a.borrow_mut().set_cycles(100);
    a.borrow_mut().run();
    a.borrow_mut().set_debug_mode(DebugMode::Pause);
    connection.disconnect();
    assert_eq!(*lines.borrow(), vec![
        "port 1 true",
        "breakpoint 200 Breakpoint(1)",
        "breakpoint 200 Breakpoint(0)",
        "0: mov r0, 7",
        "3: hlt",
        "mode Pause",
        "port 1 false",
    ]);
}

#[test]
fn timeout_is_not_an_operation() {
    let log = Log::default();
    let lines = log.0.clone();
    // Nothing is connected to port 1.
    let mut p = processor("send 1, 1, [0]\nhlt");
    p.set_debugger(Some(Debugger::with_hooks(DebugMode::Continue, Box::new(log))));
    p.set_cycles(100);
    p.run();
    assert_eq!(p.registers().pc, 0);
    assert!(lines.borrow().is_empty());
}

#[test]
fn fetch_breakpoint() {
    // Every byte of `mov r0, 7` is read when it is fetched.
    for offset in 0..3 {
        let mut p = processor("mov r0, 7\nhlt");
        p.set_breakpoint(offset, Breakpoint::READ);
        p.set_cycles(100);
        p.run();
        assert_eq!(p.registers().pc, 0);
        assert_eq!(p.registers().general[0], 0);
        assert_eq!(p.debugger().map(Debugger::mode), Some(DebugMode::Pause));
    }
}

#[test]
fn jit_matches_interpreter() {
    let binary = assemble("\
        mov r0, 0\n\
        mov r1, 10\n\
        top: add r0, r1\n\
        mov [r1+100], r0\n\
        sub r1, 1\n\
        jnz top\n\
        hlt").unwrap();
    let cache = Rc::new(RefCell::new(BlockCache::new()));
    let mut a = Processor::new(&binary);
    let mut b = Processor::with_jit(&binary, cache);
    for p in [&mut a, &mut b] {
        p.set_cycles(1_000);
        p.run();
    }
    assert_eq!(a.registers(), b.registers());
    assert_eq!(a.cycles(), b.cycles());
    assert_eq!(&a.memory()[..], &b.memory()[..]);
    assert_eq!(a.registers().general[0], 55);
}
