//! DAG wiring scenarios and the DAG → pool dispatch cycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use taskmill::pool::{Task, TaskDag, TaskId, ThreadPool};

#[test]
fn builder_wiring_matches_the_specified_shape() {
    let a = Task::from_fn(|| ());
    let b = Task::from_fn(|| ());
    let c = Task::from_fn(|| ());
    let (ida, idb, idc) = (a.id(), b.id(), c.id());

    let mut dag = TaskDag::new();
    dag.add_task(a)
        .unwrap()
        .add_dependency(b)
        .unwrap()
        .add_dependency(c)
        .unwrap();

    assert_eq!(dag.len(), 3);
    assert_eq!(dag.indegree(ida), Some(2));
    assert_eq!(dag.indegree(idb), Some(0));
    assert_eq!(dag.indegree(idc), Some(0));
    assert_eq!(dag.dependencies(ida), Some(&[idb, idc][..]));

    dag.remove_dependency(idb).unwrap();
    assert_eq!(dag.indegree(ida), Some(1));
    assert_eq!(dag.dependencies(ida), Some(&[idc][..]));
    assert!(!dag.contains(idb));
}

/// Drives a DAG to completion through the pool, recording finish order.
fn run_to_completion(mut dag: TaskDag, pool: &ThreadPool) -> Vec<TaskId> {
    let mut finished = Vec::new();
    let mut handles = Vec::new();

    loop {
        let ready = dag.ready();
        for &id in &ready {
            if let Some(handle) = dag.take_handle(id) {
                handles.push(handle);
            }
        }
        let dispatched = dag.drain_ready_into(pool);
        if dispatched.is_empty() {
            break;
        }
        // Wait for this wave before releasing successors.
        for handle in handles.drain(..) {
            handle.wait().unwrap();
        }
        for id in dispatched {
            finished.push(id);
            dag.on_complete(id).unwrap();
        }
    }
    assert!(dag.is_empty(), "every vertex retired");
    finished
}

#[test]
fn dependencies_run_before_their_successor() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mk = |label: &'static str, order: &Arc<std::sync::Mutex<Vec<&'static str>>>| {
        let order = Arc::clone(order);
        Task::from_fn(move || order.lock().unwrap().push(label))
    };

    let root = mk("root", &order);
    let dep_one = mk("dep-one", &order);
    let dep_two = mk("dep-two", &order);
    let root_id = root.id();

    let mut dag = TaskDag::new();
    dag.add_task(root)
        .unwrap()
        .add_dependency(dep_one)
        .unwrap()
        .add_dependency(dep_two)
        .unwrap();

    let pool = ThreadPool::new(2).unwrap();
    let finished = run_to_completion(dag, &pool);

    // Root is dispatched last.
    assert_eq!(finished.last(), Some(&root_id));
    let seen = order.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2], "root");
}

#[test]
fn fan_in_runs_in_two_waves() {
    let counter = Arc::new(AtomicUsize::new(0));
    let stamp = |counter: &Arc<AtomicUsize>| {
        let counter = Arc::clone(counter);
        Task::from_fn(move || counter.fetch_add(1, Ordering::SeqCst))
    };

    let root = stamp(&counter);
    let root_id = root.id();
    let deps: Vec<Task> = (0..3).map(|_| stamp(&counter)).collect();
    let dep_ids: Vec<TaskId> = deps.iter().map(Task::id).collect();

    let mut dag = TaskDag::new();
    dag.add_task(root).unwrap();
    for dep in deps {
        dag.add_dependency(dep).unwrap();
    }

    // Wave 1 is exactly the dependency set, in id order.
    assert_eq!(dag.ready(), dep_ids);

    let pool = ThreadPool::new(2).unwrap();
    let finished = run_to_completion(dag, &pool);

    assert_eq!(finished.len(), 4);
    assert_eq!(finished.last(), Some(&root_id));
    for id in &dep_ids {
        assert!(finished[..3].contains(id));
    }
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[test]
fn results_flow_through_captured_handles() {
    let base = Task::from_fn(|| 21i32);
    let double = Task::from_fn(|| 2i32);
    let base_id = base.id();
    let double_id = double.id();

    let mut dag = TaskDag::new();
    dag.add_task(base).unwrap().add_dependency(double).unwrap();

    let pool = ThreadPool::new(1).unwrap();

    let double_handle = dag.take_handle(double_id).unwrap();
    let base_handle = dag.take_handle(base_id).unwrap();

    // Wave 1: the dependency.
    assert_eq!(dag.drain_ready_into(&pool), vec![double_id]);
    assert_eq!(double_handle.wait().unwrap().downcast::<i32>().unwrap(), 2);
    assert_eq!(dag.on_complete(double_id).unwrap(), vec![base_id]);

    // Wave 2: the freed successor.
    assert_eq!(dag.drain_ready_into(&pool), vec![base_id]);
    assert_eq!(base_handle.wait().unwrap().downcast::<i32>().unwrap(), 21);
    assert!(dag.on_complete(base_id).unwrap().is_empty());
}
