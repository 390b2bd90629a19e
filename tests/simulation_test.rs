//! End-to-end simulation scenarios driven through the public surface

use memsim::{report, Block, BlockState, MemoryAllocator, PlacementPolicy, ProcessId, Simulation, Trace};

fn pid(id: u32) -> ProcessId {
    ProcessId::new(id)
}

/// Layout sanity over a snapshot: exact tiling, coalesced free space,
/// unique owners
fn assert_well_formed(blocks: &[Block], capacity: u64) {
    let mut expected_start = 0;
    let mut prev_free = false;
    let mut owners = std::collections::HashSet::new();
    for block in blocks {
        assert_eq!(block.start, expected_start);
        assert!(block.length > 0);
        match block.state {
            BlockState::Free => {
                assert!(!prev_free, "adjacent free blocks survived at {}", block.start);
                assert!(block.owner.is_none());
            }
            BlockState::Allocated => {
                let owner = block.owner.expect("allocated block without owner");
                assert!(owners.insert(owner));
            }
        }
        prev_free = block.state == BlockState::Free;
        expected_start = block.end();
    }
    assert_eq!(expected_start, capacity);
}

#[test]
fn first_fit_reuses_freed_slot() {
    let mut allocator = MemoryAllocator::new(100, PlacementPolicy::First);
    allocator.allocate(pid(1), 30).unwrap();
    allocator.allocate(pid(2), 20).unwrap();
    allocator.deallocate(pid(1)).unwrap();
    allocator.allocate(pid(3), 10).unwrap();

    let blocks = allocator.snapshot();
    assert_eq!(
        blocks,
        vec![
            Block::allocated(pid(3), 0, 10),
            Block::free(10, 20),
            Block::allocated(pid(2), 30, 20),
            Block::free(50, 50),
        ]
    );
    assert_well_formed(&blocks, 100);
}

/// Trace producing free blocks [0,10), [20,35), [50,100)
const FRAGMENTED_SETUP: &str = "A 1 10\nA 2 10\nA 3 15\nA 4 15\nD 1\nD 3\n";

#[test]
fn best_fit_picks_smallest_sufficient_block() {
    let input = format!("best\n100\n{FRAGMENTED_SETUP}A 9 12\n");
    let sim = Simulation::run(&Trace::parse(&input).unwrap());

    let blocks = sim.snapshot();
    assert!(blocks.contains(&Block::allocated(pid(9), 20, 12)));
    assert!(blocks.contains(&Block::free(32, 3)));
    assert_well_formed(&blocks, 100);
}

#[test]
fn worst_fit_picks_largest_block() {
    let input = format!("worst\n100\n{FRAGMENTED_SETUP}A 9 12\n");
    let sim = Simulation::run(&Trace::parse(&input).unwrap());

    let blocks = sim.snapshot();
    assert!(blocks.contains(&Block::allocated(pid(9), 50, 12)));
    assert!(blocks.contains(&Block::free(62, 38)));
    assert_well_formed(&blocks, 100);
}

#[test]
fn allocation_failure_triggers_compaction_then_retry_succeeds() {
    let mut allocator = MemoryAllocator::new(50, PlacementPolicy::First);
    allocator.allocate(pid(1), 10).unwrap();
    allocator.allocate(pid(2), 5).unwrap();
    allocator.allocate(pid(3), 10).unwrap();
    allocator.deallocate(pid(2)).unwrap();

    // Free blocks are [10,15) and [25,50): no single block holds 30 units
    allocator.allocate(pid(4), 30).unwrap();

    let blocks = allocator.snapshot();
    assert_eq!(
        blocks,
        vec![
            Block::allocated(pid(1), 0, 10),
            Block::allocated(pid(3), 10, 10),
            Block::allocated(pid(4), 20, 30),
        ]
    );
    assert_eq!(allocator.stats().compactions, 1);
    assert_well_formed(&blocks, 50);
}

#[test]
fn deallocate_unknown_owner_is_reported_and_harmless() {
    let trace = Trace::parse("1\n100\nA 1 30\nD 99\n").unwrap();
    let sim = Simulation::run(&trace);

    assert_eq!(sim.summary().failed_deallocations, 1);
    let blocks = sim.snapshot();
    assert_eq!(blocks[0], Block::allocated(pid(1), 0, 30));
    assert_well_formed(&blocks, 100);
}

#[test]
fn repeated_runs_produce_identical_layouts() {
    let input = format!("best\n100\n{FRAGMENTED_SETUP}A 9 12\nA 10 3\nD 2\nA 11 20\n");
    let trace = Trace::parse(&input).unwrap();

    let first = Simulation::run(&trace);
    for _ in 0..5 {
        let rerun = Simulation::run(&trace);
        assert_eq!(rerun.snapshot(), first.snapshot());
        assert_eq!(rerun.summary(), first.summary());
    }
}

#[test]
fn policy_override_changes_placement() {
    let input = format!("first\n100\n{FRAGMENTED_SETUP}A 9 12\n");
    let mut trace = Trace::parse(&input).unwrap();

    // First fit lands in [20,35); overriding to worst fit moves it to [50,..)
    let first = Simulation::run(&trace);
    assert!(first.snapshot().contains(&Block::allocated(pid(9), 20, 12)));

    trace.policy = PlacementPolicy::Worst;
    let worst = Simulation::run(&trace);
    assert!(worst.snapshot().contains(&Block::allocated(pid(9), 50, 12)));
}

#[test]
fn trace_report_flow_renders_tables_and_json() {
    let trace = Trace::parse("1\n100\nA 1 30\nP\nA 2 20\n").unwrap();
    let mut sim = Simulation::new(trace.capacity, trace.policy);

    let mut rendered = Vec::new();
    for &command in &trace.commands {
        if let Some(layout) = sim.apply(command) {
            rendered.push(report::layout_table(&layout).to_string());
        }
    }
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains("FULL"));
    assert!(rendered[0].contains("30"));

    let json = report::snapshot_json(&sim.snapshot(), &sim.stats()).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(doc["blocks"].as_array().unwrap().len(), 3);
    assert_eq!(doc["stats"]["allocated_units"], serde_json::json!(50));
}

#[test]
fn exhausting_and_draining_the_space_round_trips() {
    let mut sim = Simulation::new(120, PlacementPolicy::Best);
    let sizes = [30, 20, 50, 20];
    for (i, &size) in sizes.iter().enumerate() {
        sim.apply(memsim::Command::Allocate {
            owner: pid(i as u32),
            size,
        });
    }
    assert_eq!(sim.stats().free_units, 0);
    assert_well_formed(&sim.snapshot(), 120);

    for i in 0..sizes.len() {
        sim.apply(memsim::Command::Deallocate { owner: pid(i as u32) });
        assert_well_formed(&sim.snapshot(), 120);
    }
    assert_eq!(sim.snapshot(), vec![Block::free(0, 120)]);
    assert_eq!(sim.summary().failed_allocations, 0);
    assert_eq!(sim.summary().failed_deallocations, 0);
}
