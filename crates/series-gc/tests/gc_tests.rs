//! GC correctness tests
//!
//! These tests drive full cycles through the public collector API and check
//! that reachable nodes survive, unreachable ones are reclaimed, and the
//! memory dump reports what was traced.

use series_gc::ffi::{RoutineInfo, RoutineTarget, StructField};
use series_gc::gob::{Gob, GobData, GobKind};
use series_gc::value::{Binding, EventModel, FunctionBody, Request, VarargsSource};
use series_gc::{
    Collector, ContextKind, Device, Feed, Frame, GcConfig, HostRoots, NodeFlags, PoolKind, SeriesId,
    Value,
};

fn managed_block(gc: &mut Collector, values: Vec<Value>) -> SeriesId {
    let heap = gc.heap_mut();
    let array = heap.make_array(values);
    heap.manage(array);
    array
}

fn managed_string(gc: &mut Collector, text: &str) -> SeriesId {
    let heap = gc.heap_mut();
    let series = heap.make_string(text);
    heap.manage(series);
    series
}

/// Module context installed as the root context, holding `fields`.
fn rooted_context(gc: &mut Collector, fields: &[(&str, Value)]) -> SeriesId {
    let heap = gc.heap_mut();
    let fields: Vec<_> = fields.iter().map(|(name, value)| (heap.intern(name), value.clone())).collect();
    let ctx = heap.make_context(ContextKind::Module, &fields);
    heap.manage_context(ctx);
    gc.set_root_context(Some(ctx)).unwrap();
    ctx
}

#[test]
fn test_collect_simple_garbage() {
    let mut gc = Collector::default();
    let a = managed_block(&mut gc, vec![Value::Integer(1)]);
    let s = managed_string(&mut gc, "garbage");
    let unmanaged = gc.heap_mut().make_array(Vec::new());

    assert_eq!(gc.collect(), 2);
    assert!(!gc.heap().is_live(a));
    assert!(!gc.heap().is_live(s));
    // Unmanaged nodes belong to their creator
    assert!(gc.heap().is_live(unmanaged));
}

#[test]
fn test_reachable_graph_survives() {
    let mut gc = Collector::default();
    let text = managed_string(&mut gc, "hello");
    let inner = managed_block(&mut gc, vec![Value::string(text), Value::Integer(7)]);
    let outer = managed_block(&mut gc, vec![Value::block(inner)]);
    let pairlist = {
        let heap = gc.heap_mut();
        let pairlist = heap.make_map(vec![Value::Integer(1), Value::block(outer)], true);
        heap.manage_map(pairlist);
        pairlist
    };
    let hashlist = gc.heap().series(pairlist).hashlist().unwrap();
    let ctx = rooted_context(&mut gc, &[("m", Value::Map { pairlist })]);

    assert_eq!(gc.collect(), 0);
    for series in [text, inner, outer, pairlist, hashlist, ctx] {
        assert!(gc.heap().is_live(series));
        assert!(!gc.heap().header(series).contains(NodeFlags::MARKED));
    }
}

#[test]
fn test_cycles_are_reclaimed() {
    let mut gc = Collector::default();
    let a = managed_block(&mut gc, vec![Value::None]);
    let b = managed_block(&mut gc, vec![Value::block(a)]);
    gc.heap_mut().set_cell(a, 0, Value::block(b)).unwrap();

    assert_eq!(gc.collect(), 2);
    assert!(!gc.heap().is_live(a));
    assert!(!gc.heap().is_live(b));
}

#[test]
fn test_marking_is_idempotent() {
    let mut gc = Collector::default();
    let shared = managed_block(&mut gc, vec![Value::Integer(1)]);
    rooted_context(&mut gc, &[("a", Value::block(shared)), ("b", Value::block(shared))]);

    let (reclaimed, text) = gc.collect_with_dump().unwrap();
    assert_eq!(reclaimed, 0);

    let addr = shared.addr().to_string();
    let sizes: Vec<&str> = text
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(|line| line.split(',').collect::<Vec<_>>())
        .filter(|fields| fields[0] == addr)
        .map(|fields| fields[3])
        .collect();
    assert_eq!(sizes.len(), 2);
    assert_eq!(sizes.iter().filter(|size| **size != "0").count(), 1);
}

#[test]
fn test_shared_keylist_survives_with_any_varlist() {
    let mut gc = Collector::default();
    let proto = {
        let heap = gc.heap_mut();
        let x = heap.intern("x");
        let proto = heap.make_context(ContextKind::Object, &[(x, Value::Integer(1))]);
        heap.manage_context(proto);
        proto
    };
    let keylist = gc.heap().series(proto).keylist().unwrap();
    let child = gc.heap_mut().derive_context(proto);
    gc.heap_mut().manage(child);
    rooted_context(&mut gc, &[("child", Value::object(child))]);

    // Only the prototype's varlist is garbage
    assert_eq!(gc.collect(), 1);
    assert!(!gc.heap().is_live(proto));
    assert!(gc.heap().is_live(child));
    assert!(gc.heap().is_live(keylist));
}

#[test]
fn test_deep_chain_does_not_overflow() {
    const DEPTH: usize = 200_000;
    let mut gc = Collector::default();
    let mut tail = managed_block(&mut gc, Vec::new());
    for _ in 1..DEPTH {
        tail = managed_block(&mut gc, vec![Value::block(tail)]);
    }
    let guard = gc.guard_series(tail);

    assert_eq!(gc.collect(), 0);
    assert_eq!(gc.stats().last_marked, DEPTH);

    // The guard lapsed with the cycle; the whole chain is now garbage
    gc.unguard_series(guard);
    assert_eq!(gc.collect(), DEPTH);
    assert_eq!(gc.heap().managed_count(), 0);
}

#[test]
fn test_deep_struct_chain_does_not_overflow() {
    const DEPTH: usize = 100_000;
    let mut gc = Collector::default();
    let top = {
        let heap = gc.heap_mut();
        let spec = heap.make_array(Vec::new());
        heap.manage(spec);
        let mut prev = Value::None;
        for _ in 0..DEPTH {
            let mirror = heap.make_struct(spec, vec![StructField::value(None, 0, 1)], 0, vec![prev]);
            heap.manage_struct(&mirror);
            prev = Value::Struct(Box::new(mirror));
        }
        prev
    };
    let guard = gc.guard_value(top);

    assert_eq!(gc.collect(), 0);
    // Fields, data and cells per struct, plus the shared spec
    assert_eq!(gc.stats().last_marked, 3 * DEPTH + 1);

    gc.unguard_value(guard);
    assert_eq!(gc.collect(), 3 * DEPTH + 1);
    assert_eq!(gc.heap().managed_count(), 0);
}

#[test]
fn test_deep_gob_chain_does_not_overflow() {
    const DEPTH: usize = 200_000;
    let mut gc = Collector::default();
    let leaf = {
        let heap = gc.heap_mut();
        let mut parent = heap.make_gob(Gob::new(GobKind::Color));
        for _ in 1..DEPTH {
            let mut gob = Gob::new(GobKind::Color);
            gob.parent = Some(parent);
            parent = heap.make_gob(gob);
        }
        parent
    };
    let guard = gc.guard_value(Value::Gob { gob: leaf, index: 0 });

    assert_eq!(gc.collect(), 0);
    assert_eq!(gc.stats().last_marked, DEPTH);
    gc.unguard_value(guard);
    assert_eq!(gc.collect(), DEPTH);
    assert_eq!(gc.stats().reclaimed_by_pool[&PoolKind::Gob], DEPTH);
}

#[test]
fn test_guard_survives_one_cycle() {
    let mut gc = Collector::default();
    let a = managed_block(&mut gc, Vec::new());
    let v = managed_string(&mut gc, "guarded");
    let series_guard = gc.guard_series(a);
    let value_guard = gc.guard_value(Value::string(v));

    assert_eq!(gc.collect(), 0);
    assert_eq!(gc.roots().guard_depth(), (0, 0));

    // Stale tokens are accepted
    assert_eq!(gc.unguard_value(value_guard), None);
    gc.unguard_series(series_guard);

    assert_eq!(gc.collect(), 2);
}

#[test]
fn test_scoped_guard() {
    let mut gc = Collector::default();
    let a = managed_block(&mut gc, Vec::new());
    let reclaimed = gc.with_guarded_series(a, |gc| {
        managed_block(gc, Vec::new());
        gc.collect()
    });
    assert_eq!(reclaimed, 1);
    assert!(gc.heap().is_live(a));
    assert_eq!(gc.collect(), 1);
}

#[test]
#[should_panic(expected = "is not managed")]
fn test_guarding_unmanaged_value_is_fatal() {
    let mut gc = Collector::default();
    let a = gc.heap_mut().make_array(Vec::new());
    let _guard = gc.guard_value(Value::block(a));
}

#[test]
fn test_shutdown_reclaims_everything() {
    let mut gc = Collector::default();
    let block = managed_block(&mut gc, vec![Value::Integer(1)]);
    rooted_context(&mut gc, &[("b", Value::block(block))]);
    gc.heap_mut().make_gob(Gob::new(GobKind::Color));
    gc.heap_mut().open_library("libm.so");
    let _guard = gc.guard_series(block);

    let managed = gc.heap().managed_count();
    assert_eq!(managed, 5);
    assert_eq!(gc.shutdown(), managed);
}

#[test]
fn test_gob_graph_with_cycles() {
    let mut gc = Collector::default();
    let data = {
        let heap = gc.heap_mut();
        let name = heap.intern("name");
        let text = heap.make_string("button");
        heap.manage(text);
        let ctx = heap.make_context(ContextKind::Object, &[(name, Value::string(text))]);
        heap.manage_context(ctx);
        ctx
    };
    let draw = managed_block(&mut gc, vec![Value::Integer(10)]);

    let (parent, child, pane) = {
        let heap = gc.heap_mut();
        let parent = heap.make_gob(Gob::new(GobKind::Color));
        let mut child_gob = Gob::new(GobKind::Draw);
        child_gob.content = Some(draw);
        child_gob.data = GobData::Object(data);
        child_gob.parent = Some(parent);
        let child = heap.make_gob(child_gob);
        let pane = heap.make_pane(vec![child]);
        heap.manage(pane);
        heap.gob_mut(parent).pane = Some(pane);
        (parent, child, pane)
    };

    let guard = gc.guard_value(Value::Gob { gob: child, index: 0 });
    assert_eq!(gc.collect(), 0);
    assert!(gc.heap().gob_is_live(parent));
    assert!(gc.heap().is_live(pane));
    assert!(gc.heap().is_live(draw));
    assert!(gc.heap().is_live(data));
    gc.unguard_value(guard);

    // parent, child, pane, draw block, context (2) and its string
    assert_eq!(gc.collect(), 7);
    assert!(!gc.heap().gob_is_live(child));
    assert_eq!(gc.stats().reclaimed_by_pool[&PoolKind::Gob], 2);
}

#[test]
fn test_self_referencing_struct() {
    let mut gc = Collector::default();
    let kept = managed_block(&mut gc, vec![Value::Integer(99)]);
    let (mirror, inner_fields, inner_spec) = {
        let heap = gc.heap_mut();
        let a = heap.intern("a");
        let b = heap.intern("b");
        let c = heap.intern("c");
        let spec = heap.make_array(Vec::new());
        heap.manage(spec);
        let inner_spec = heap.make_array(Vec::new());
        heap.manage(inner_spec);
        let inner_fields = heap.make_fields(vec![StructField::value(Some(c), 0, 1)]);
        heap.manage(inner_fields);

        let fields = vec![
            StructField::value(Some(a), 0, 1),
            StructField::nested(Some(b), 1, inner_fields, inner_spec),
        ];
        let mirror = heap.make_struct(spec, fields, 16, vec![Value::None, Value::block(kept)]);
        heap.manage_struct(&mirror);
        // The struct holds a value that is the struct itself
        heap.set_cell(mirror.cells, 0, Value::Struct(Box::new(mirror.clone()))).unwrap();
        (mirror, inner_fields, inner_spec)
    };

    let guard = gc.guard_value(Value::Struct(Box::new(mirror.clone())));
    assert_eq!(gc.collect(), 0);
    for series in [mirror.spec, mirror.fields, mirror.data, mirror.cells, inner_fields, inner_spec, kept] {
        assert!(gc.heap().is_live(series));
    }
    gc.unguard_value(guard);
    assert_eq!(gc.collect(), 7);
}

#[test]
fn test_routines_swept_before_their_series() {
    let mut gc = Collector::default();
    let (func, routine, lib, fixed) = {
        let heap = gc.heap_mut();
        let lib = heap.open_library("libfoo.so");
        let spec = heap.make_array(Vec::new());
        let arg_types = heap.make_binary(vec![1, 2, 3]);
        let arg_structs = heap.make_array(Vec::new());
        let extra_mem = heap.make_binary(Vec::new());
        let fixed = heap.make_array(vec![Value::Integer(1)]);
        for series in [spec, arg_types, arg_structs, extra_mem, fixed] {
            heap.manage(series);
        }
        let routine = heap.make_routine(RoutineInfo {
            spec,
            arg_types,
            arg_structs,
            extra_mem,
            target: RoutineTarget::Foreign {
                lib: Some(lib),
                variadic: true,
                fixed_args: Some(fixed),
                all_args: None,
            },
        });
        let func = heap.make_function(spec, &[], FunctionBody::Routine(routine));
        heap.manage(func.paramlist);
        (func, routine, lib, fixed)
    };
    rooted_context(&mut gc, &[("foo", Value::Function(func))]);

    assert_eq!(gc.collect(), 0);
    assert!(gc.heap().routine_is_live(routine));
    assert!(gc.heap().library_is_live(lib));
    assert!(gc.heap().is_live(fixed));

    gc.set_root_context(None).unwrap();
    // root context (2), paramlist, five series, routine, library
    assert_eq!(gc.collect(), 10);
    assert!(!gc.heap().routine_is_live(routine));
    assert!(!gc.heap().library_is_live(lib));
}

#[test]
fn test_callback_keeps_wrapped_function() {
    let mut gc = Collector::default();
    let (callback, wrapped) = {
        let heap = gc.heap_mut();
        let spec = heap.make_array(Vec::new());
        let body = heap.make_array(vec![Value::Integer(1)]);
        let arg_types = heap.make_binary(Vec::new());
        let arg_structs = heap.make_array(Vec::new());
        let extra_mem = heap.make_binary(Vec::new());
        for series in [spec, body, arg_types, arg_structs, extra_mem] {
            heap.manage(series);
        }
        let wrapped = heap.make_function(spec, &[], FunctionBody::User(body));
        heap.manage(wrapped.paramlist);
        let routine = heap.make_routine(RoutineInfo {
            spec,
            arg_types,
            arg_structs,
            extra_mem,
            target: RoutineTarget::Callback {
                func: Some(wrapped.paramlist),
            },
        });
        let callback = heap.make_function(spec, &[], FunctionBody::Callback(routine));
        heap.manage(callback.paramlist);
        (callback, wrapped)
    };
    let _guard = gc.guard_value(Value::Function(callback));
    assert_eq!(gc.collect(), 0);
    assert!(gc.heap().is_live(wrapped.paramlist));
}

#[test]
fn test_frames_keep_their_values() {
    let mut gc = Collector::default();
    let pending = managed_block(&mut gc, Vec::new());
    let arg = managed_string(&mut gc, "arg");
    let source = managed_block(&mut gc, vec![Value::Integer(1)]);
    let paramlist = {
        let heap = gc.heap_mut();
        let spec = heap.make_array(Vec::new());
        heap.manage(spec);
        let x = heap.intern("x");
        let func = heap.make_function(spec, &[x], FunctionBody::Native);
        heap.manage(func.paramlist);
        func.paramlist
    };

    let mut frame = Frame::call(paramlist, Feed::Array { array: source, index: 0 });
    frame.args.push(Value::string(arg));
    frame.out = Value::block(pending);
    gc.roots_mut().frames.push(frame);

    assert_eq!(gc.collect(), 0);
    for series in [pending, arg, source, paramlist] {
        assert!(gc.heap().is_live(series));
    }

    gc.roots_mut().frames.clear();
    assert_eq!(gc.collect(), 5);
}

#[test]
fn test_variadic_feed_is_reified() {
    let mut gc = Collector::default();
    let fed = managed_block(&mut gc, Vec::new());
    let feed = Feed::Variadic([Value::block(fed), Value::Integer(2)].into_iter().collect());
    gc.roots_mut().frames.push(Frame::native(feed));

    assert_eq!(gc.collect(), 0);
    assert!(gc.heap().is_live(fed));
    let Feed::Array { array, index } = gc.roots().frames[0].feed.clone() else {
        panic!("feed was not reified");
    };
    assert_eq!(index, 0);
    assert_eq!(gc.heap().series(array).len(), 2);
}

#[test]
fn test_dropped_stack_context_hides_its_vars() {
    let mut gc = Collector::default();
    let hidden = managed_block(&mut gc, Vec::new());
    let ctx = {
        let heap = gc.heap_mut();
        let local = heap.intern("local");
        let ctx = heap.make_stack_context(ContextKind::Frame, &[(local, Value::block(hidden))]);
        heap.manage_context(ctx);
        ctx
    };
    let _guard = gc.guard_value(Value::Context {
        kind: ContextKind::Frame,
        varlist: ctx,
        spec: None,
    });

    gc.heap_mut().drop_stack_vars(ctx);
    assert_eq!(gc.collect(), 1);
    assert!(gc.heap().is_live(ctx));
    assert!(!gc.heap().is_live(hidden));
}

#[test]
fn test_other_roots() {
    let mut gc = Collector::default();
    let on_stack = managed_block(&mut gc, Vec::new());
    let error = managed_string(&mut gc, "callback failed");
    let port = {
        let heap = gc.heap_mut();
        let state = heap.intern("state");
        let port = heap.make_context(ContextKind::Port, &[(state, Value::None)]);
        heap.manage_context(port);
        port
    };
    let task = {
        let heap = gc.heap_mut();
        let task = heap.make_context(ContextKind::Object, &[]);
        heap.manage_context(task);
        task
    };

    let roots = gc.roots_mut();
    roots.data_stack.push(Value::block(on_stack));
    roots.callback_error = Value::string(error);
    roots.devices.push(Device {
        name: "net".into(),
        pending: vec![Request { port: Some(port) }],
    });
    gc.set_task_context(Some(task)).unwrap();

    assert_eq!(gc.collect(), 0);
    for series in [on_stack, error, port, task] {
        assert!(gc.heap().is_live(series));
    }

    let roots = gc.roots_mut();
    roots.data_stack.clear();
    roots.callback_error = Value::None;
    roots.devices.clear();
    gc.set_task_context(None).unwrap();
    assert_eq!(gc.collect(), 6);
}

#[test]
fn test_event_payloads() {
    let mut gc = Collector::default();
    let files = managed_block(&mut gc, vec![Value::Integer(1)]);
    let port = {
        let heap = gc.heap_mut();
        let port = heap.make_context(ContextKind::Port, &[]);
        heap.manage_context(port);
        port
    };
    let gob = gc.heap_mut().make_gob(Gob::default());

    rooted_context(
        &mut gc,
        &[
            ("drop", Value::Event(Box::new(EventModel::DropFile { files: Some(files) }))),
            ("dev", Value::Event(Box::new(EventModel::Device(vec![Request { port: Some(port) }])))),
            ("gui", Value::Event(Box::new(EventModel::Gui(Some(gob))))),
        ],
    );
    assert_eq!(gc.collect(), 0);
    assert!(gc.heap().is_live(files));
    assert!(gc.heap().is_live(port));
    assert!(gc.heap().gob_is_live(gob));
}

#[test]
fn test_varargs_subfeed() {
    let mut gc = Collector::default();
    let subfeed = managed_block(&mut gc, vec![Value::Integer(3)]);
    let array1 = managed_block(&mut gc, vec![Value::None]);
    gc.heap_mut().set_subfeed(array1, Some(subfeed));
    rooted_context(&mut gc, &[("args", Value::Varargs(VarargsSource::Array1(array1)))]);

    assert_eq!(gc.collect(), 0);
    assert!(gc.heap().is_live(subfeed));
}

#[test]
fn test_words_keep_their_binding() {
    let mut gc = Collector::default();
    let bound = {
        let heap = gc.heap_mut();
        let v = heap.intern("v");
        let ctx = heap.make_context(ContextKind::Object, &[(v, Value::Integer(1))]);
        heap.manage_context(ctx);
        ctx
    };
    let word = {
        let heap = gc.heap_mut();
        let v = heap.intern("v");
        Value::word(v, Binding::Context(bound))
    };
    rooted_context(&mut gc, &[("w", word)]);
    assert_eq!(gc.collect(), 0);
    assert!(gc.heap().is_live(bound));
}

#[test]
fn test_host_roots_hook() {
    let mut gc = Collector::default();
    let held = managed_block(&mut gc, Vec::new());
    let host = HostRoots::new();
    host.install(&mut gc);
    let handle = host.hold(Value::block(held));

    assert_eq!(gc.collect(), 0);
    assert_eq!(gc.collect(), 0);
    assert!(gc.heap().is_live(held));

    host.release(handle);
    assert_eq!(gc.collect(), 1);
    assert!(host.is_empty());
}

#[test]
fn test_mark_hook_closure() {
    let mut gc = Collector::default();
    let kept = managed_block(&mut gc, Vec::new());
    gc.set_mark_hook(move |marker| marker.mark_value(&Value::block(kept)));
    assert_eq!(gc.collect(), 0);
    gc.clear_mark_hook();
    assert_eq!(gc.collect(), 1);
}

#[test]
fn test_disable_is_counted() {
    let mut gc = Collector::default();
    managed_block(&mut gc, Vec::new());
    gc.disable();
    gc.disable();
    assert_eq!(gc.collect(), 0);
    gc.enable();
    assert_eq!(gc.collect_if_requested(), None);
    gc.enable();
    assert_eq!(gc.collect_if_requested(), Some(1));

    gc.set_active(false);
    managed_block(&mut gc, Vec::new());
    assert_eq!(gc.collect(), 0);
    gc.set_active(true);
    assert_eq!(gc.collect(), 1);
}

#[test]
fn test_exhausted_ballast_requests_cycle() {
    let mut gc = Collector::new(GcConfig {
        ballast: 4096,
        ..GcConfig::default()
    });
    assert_eq!(gc.collect_if_requested(), None);
    for _ in 0..64 {
        let heap = gc.heap_mut();
        let bytes = heap.make_binary(vec![0; 256]);
        heap.manage(bytes);
    }
    assert!(gc.heap().recycle_requested());
    assert_eq!(gc.collect_if_requested(), Some(64));
    assert!(!gc.heap().recycle_requested());
}

#[test]
fn test_ballast_grows_with_live_data() {
    let mut gc = Collector::new(GcConfig {
        ballast: 4096,
        ..GcConfig::default()
    });
    let mut strings = Vec::new();
    for _ in 0..64 {
        let heap = gc.heap_mut();
        let bytes = heap.make_binary(vec![0; 256]);
        heap.manage(bytes);
        strings.push(Value::string(bytes));
    }
    let holder = managed_block(&mut gc, strings);
    rooted_context(&mut gc, &[("data", Value::block(holder))]);

    let used = gc.heap().ballast().used();
    assert!(used > 4096);
    assert_eq!(gc.collect(), 0);
    assert_eq!(gc.heap().ballast().ballast(), used * 5 / 4);
}

#[test]
fn test_memory_dump_format() {
    let mut gc = Collector::default();
    let answer = managed_string(&mut gc, "forty-two");
    rooted_context(&mut gc, &[("answer", Value::string(answer))]);
    let garbage = managed_block(&mut gc, Vec::new());

    let path = std::env::temp_dir().join(format!("series-gc-usage-{}.csv", std::process::id()));
    assert_eq!(gc.dump_memory_usage(&path).unwrap(), 1);
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("#Addr,parent,type,size,name"));
    for line in text.lines().filter(|line| !line.starts_with('#')) {
        assert_eq!(line.split(',').count(), 6, "malformed row {line}");
    }
    assert!(text.lines().any(|line| line.contains(",(nil),") && line.ends_with(",Root-Context")));
    assert!(text.lines().any(|line| line.ends_with(",answer")));
    let swept = garbage.addr().to_string();
    assert!(text.lines().any(|line| line.starts_with(&swept) && line.contains("<swept>")));
}

#[test]
fn test_watch_recycle_logs_cycles() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let mut gc = Collector::new(GcConfig {
        watch_recycle: true,
        ..GcConfig::default()
    });
    managed_block(&mut gc, Vec::new());
    assert_eq!(gc.collect(), 1);
    assert_eq!(gc.stats().total_reclaimed, 1);
    assert!(gc.stats().total_pause >= gc.stats().last_pause);
}
