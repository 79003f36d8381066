//! Protection faults, override-hook device emulation and fetch notification
//! observed through executed programs.

use zpu_core::{attr, load_image, Console, Control, Cpu, Hooks, MemMap, NopHooks, Segment};

const RAM_SIZE: u32 = 0x10000;
const STACK_TOP: u32 = RAM_SIZE - 8;

const NOP: u8 = 11;
const STORE: u8 = 12;
const LOAD: u8 = 8;

fn boot_with(program: &[u8], extra: Option<Segment>) -> Cpu {
    let mut memory = MemMap::new();
    memory.add_segment(Segment::new(
        "ram",
        vec![0; RAM_SIZE as usize],
        0,
        attr::RD | attr::WR | attr::EX,
    ));
    if let Some(seg) = extra {
        memory.add_segment(seg);
    }
    let mut hooks = NopHooks;
    load_image(&mut memory, &mut hooks, program).unwrap();
    let mut cpu = Cpu::new(memory);
    cpu.reset(STACK_TOP);
    cpu
}

#[derive(Default)]
struct FaultHooks {
    breaks: u32,
    segvs: u32,
    segv_va: u32,
    fetches: u32,
}

impl Hooks for FaultHooks {
    fn breakpoint(&mut self, _cpu: &Cpu) -> Control {
        self.breaks += 1;
        Control::Halt
    }
    fn segv(&mut self, va: u32) {
        self.segvs += 1;
        self.segv_va = va;
    }
    fn opcode_fetch(&mut self, _va: u32) {
        self.fetches += 1;
    }
}

#[test]
fn test_store_to_protected_segment_faults_once() {
    // value 5, then address 0x20000, then STORE
    let program = [
        0x85, // imm 5
        NOP,
        0x88, 0x80, 0x80, // imm 0x20000
        STORE, 0,
    ];
    let mut rom = Segment::new("rom", vec![0; 64], 0x20000, attr::RD);
    rom.set_protection(true);
    let mut cpu = boot_with(&program, Some(rom));
    let mut hooks = FaultHooks::default();
    cpu.execute(&mut hooks, &mut Console);

    assert_eq!(hooks.segvs, 1);
    assert_eq!(hooks.segv_va, 0x20000);
    assert_eq!(hooks.breaks, 1);
    // backing unchanged, readable through the still-permitted read path
    let mut nop = NopHooks;
    assert_eq!(cpu.memory.get_u32(&mut nop, 0x20000), 0);
}

#[test]
fn test_store_to_unprotected_segment_succeeds() {
    let program = [0x85, NOP, 0x88, 0x80, 0x80, STORE, 0];
    let rom = Segment::new("rom", vec![0; 64], 0x20000, attr::RD);
    let mut cpu = boot_with(&program, Some(rom));
    let mut hooks = FaultHooks::default();
    cpu.execute(&mut hooks, &mut Console);

    assert_eq!(hooks.segvs, 0);
    let mut nop = NopHooks;
    assert_eq!(cpu.memory.get_u32(&mut nop, 0x20000), 5);
}

#[test]
fn test_override_hook_emulates_a_device() {
    const UART_DATA: u32 = 0xF000;

    struct Uart {
        written: Vec<u8>,
        breaks: u32,
    }
    impl Hooks for Uart {
        fn breakpoint(&mut self, _cpu: &Cpu) -> Control {
            self.breaks += 1;
            Control::Halt
        }
        fn override_get_u32(&mut self, va: u32) -> Option<u32> {
            // status port always reports ready
            (va == UART_DATA).then_some(0x100)
        }
        fn override_set_u32(&mut self, va: u32, value: u32) -> bool {
            if va == UART_DATA {
                self.written.push(value as u8);
                true
            } else {
                false
            }
        }
    }

    // store 'A' (65 = (0 << 7) | 65, two immediate bytes) to the uart port
    let program = [
        0x80, 0xC1, // imm 65
        NOP,
        0x83, 0xE0, 0x80, // imm 0xF000
        STORE, 0,
    ];
    let mut cpu = boot_with(&program, None);
    let mut hooks = Uart {
        written: vec![],
        breaks: 0,
    };
    cpu.execute(&mut hooks, &mut Console);

    assert_eq!(hooks.written, vec![b'A']);
    assert_eq!(hooks.breaks, 1);
    // the backing buffer behind the port address was never touched
    let mut nop = NopHooks;
    assert_eq!(cpu.memory.get_u32(&mut nop, UART_DATA), 0);
}

#[test]
fn test_override_read_shadows_backing() {
    struct Status;
    impl Hooks for Status {
        fn override_get_u32(&mut self, va: u32) -> Option<u32> {
            (va == 0x2000).then_some(0xABCD)
        }
    }

    let mut cpu = boot_with(&[0x80, 0xC0, 0x80, LOAD, 0], None); // imm 0x2000, LOAD
    let mut nop = NopHooks;
    cpu.memory.set_u32(&mut nop, 0x2000, 0x1111);

    let mut hooks = Status;
    // step the immediates and the LOAD
    for _ in 0..4 {
        cpu.step(&mut hooks, &mut Console);
    }
    assert_eq!(cpu.tos, 0xABCD);
}

#[test]
fn test_opcode_fetch_notify_fires_per_fetch() {
    let mut cpu = boot_with(&[NOP, NOP, NOP, 0], None);
    let mut hooks = FaultHooks::default();
    cpu.execute(&mut hooks, &mut Console);
    assert_eq!(hooks.fetches, 4);
}

#[test]
fn test_load_from_unmapped_address_yields_sentinel() {
    // imm 0x40000 (outside every segment), LOAD
    let program = [0x90, 0x80, 0x80, LOAD, 0];
    let mut cpu = boot_with(&program, None);
    let mut hooks = FaultHooks::default();
    cpu.execute(&mut hooks, &mut Console);

    assert_eq!(hooks.segvs, 1);
    assert_eq!(cpu.tos, 0xFEFEFEFE);
}
