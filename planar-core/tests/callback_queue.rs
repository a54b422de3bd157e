mod common;

use std::cell::Cell;
use std::rc::Rc;

use planar_core::CallbackQueue;

#[test]
fn test_kept_callback_runs_from_second_execute() {
    let mut queue: CallbackQueue<Vec<u32>> = CallbackQueue::new();
    let mut runs = Vec::new();
    let calls = Rc::new(Cell::new(0));
    let seen = Rc::clone(&calls);
    let handle = queue.add(true, move |runs: &mut Vec<u32>, _| runs.push(seen.get()));

    for call in 1..=3 {
        calls.set(call);
        queue.execute(&mut runs);
    }
    assert_eq!(runs, vec![2, 3]);

    // stopping lets the promoted run finish, then drops it
    handle.stop();
    calls.set(4);
    queue.execute(&mut runs);
    calls.set(5);
    queue.execute(&mut runs);
    assert_eq!(runs, vec![2, 3, 4]);
    assert!(queue.is_empty());
}

#[test]
fn test_renderer_defers_to_next_frame() {
    let (mut renderer, _gl) = common::renderer();
    let frames = Rc::new(Cell::new(0));
    let seen = Rc::clone(&frames);
    renderer.on_render(move |_| seen.set(seen.get() + 1));

    let ran_at = Rc::new(Cell::new(None));
    let (ran, counted) = (Rc::clone(&ran_at), Rc::clone(&frames));
    renderer.render();
    renderer.next_render().add(false, move |_, _| ran.set(Some(counted.get())));
    assert_eq!(ran_at.get(), None);
    renderer.render();
    renderer.render();
    // ran before the second frame's render callback
    assert_eq!(ran_at.get(), Some(1));
}
