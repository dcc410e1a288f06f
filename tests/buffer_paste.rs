use mineset::construct::{Lid, Uid};
use mineset::container::Source;
use mineset::content::{Locate, Pick};
use mineset::record::Record;
use mineset::stored::StoredContentCollection;

fn filled(n: Uid) -> (StoredContentCollection<Record>, Lid) {
    let mut stored = StoredContentCollection::new();
    let lid = stored.new_list(None, None);
    for uid in 0..n {
        stored.add_item(Record::new(uid).with("n", uid), Some(lid), None);
    }
    (stored, lid)
}

#[test]
fn fresh_collection_cut_paste_scenario() {
    let (mut stored, lid) = filled(1);
    assert_eq!(stored.buffer_len(), 0);
    assert_eq!(stored.history_len(), 0);
    stored.cut(lid, Locate::At(0)).expect("cut one");
    assert_eq!((stored.buffer_len(), stored.list_len(lid)), (1, 0));
    stored.paste(lid, None).expect("paste one");
    assert_eq!((stored.buffer_len(), stored.list_len(lid)), (0, 1));
}

#[test]
fn cut_then_paste_restores_order() {
    for pos in 0..5 {
        let (mut stored, lid) = filled(5);
        let before = stored.iids_of(lid);
        stored.cut(lid, Locate::At(pos)).expect("cut");
        stored.paste(lid, Some(pos)).expect("paste");
        assert_eq!(stored.iids_of(lid), before, "round trip at {}", pos);
        stored.check_consistency().expect("consistent");
    }
}

#[test]
fn nested_cuts_paste_back_in_reverse() {
    let (mut stored, lid) = filled(3);
    stored.cut(lid, Locate::At(0));
    stored.cut(lid, Locate::At(0));
    assert_eq!(stored.iids_of(lid), vec![2]);
    stored.paste(lid, Some(0));
    assert_eq!(stored.iids_of(lid), vec![1, 2], "last cut comes back first");
    stored.paste(lid, Some(0));
    assert_eq!(stored.iids_of(lid), vec![0, 1, 2]);
    assert_eq!(stored.buffer_len(), 0);
}

#[test]
fn bulk_cut_paste_keeps_block_together() {
    let (mut stored, lid) = filled(6);
    let other = stored.new_list(None, Some("other".into()));
    assert_eq!(stored.cut_many(lid, &Pick::Positions(vec![2, 3, 4])).len(), 3);
    stored.cut(lid, Locate::Last);
    assert_eq!(stored.iids_of(lid), vec![0, 1]);
    // the single cut is pasted first
    stored.paste(other, None);
    assert_eq!(stored.paste_many(other, Some(0)), vec![0, 1, 2]);
    assert_eq!(stored.iids_of(other), vec![2, 3, 4, 5]);
    assert_eq!(stored.buffer_len(), 0);
    stored.check_consistency().expect("consistent");
}

#[test]
fn copies_to_buffer_and_history_leave_source_alone() {
    let (mut stored, lid) = filled(3);
    stored.copy_to_buffer_many(lid, &Pick::Iids(vec![0, 2]));
    stored.copy_to_history(lid, Locate::Iid(1));
    assert_eq!(stored.iids_of(lid), vec![0, 1, 2]);
    assert_eq!(stored.buffer_len(), 2);
    assert_eq!(stored.history_len(), 1);
    assert_eq!(stored.nb_items(), 6);
    stored.clear_buffer();
    stored.clear_history();
    assert_eq!(stored.paste(lid, None), None, "clearing drops buffered marks");
    assert_eq!(stored.prune(), (3, 0));
    stored.check_consistency().expect("consistent");
}

#[test]
fn stale_marks_do_not_block_recent_cut() {
    let (mut stored, lid) = filled(3);
    stored.cut(lid, Locate::At(0)).expect("cut first");
    stored.cut(lid, Locate::At(0)).expect("cut second");
    stored.delete_item(0).expect("buffered item deleted");
    assert_eq!(stored.paste(lid, Some(0)), Some(0));
    assert_eq!(stored.iids_of(lid), vec![1, 2]);
    assert_eq!(stored.buffer_len(), 0);
    stored.check_consistency().expect("consistent");
}

#[test]
fn pruned_source_gets_a_new_list() {
    let mut stored: StoredContentCollection<Record> = StoredContentCollection::new();
    let source = Source::file("/data/a.csv");
    let lid = stored.new_list(Some(source.clone()), None);
    stored.prune();
    assert!(!stored.has_lid(lid));
    assert_eq!(stored.append_item_to_source(Record::new(5), source.clone()), Some(0));
    let reopened = stored.source_lid(&source).expect("source open again");
    assert!(stored.has_lid(reopened));
    assert_eq!(stored.iids_of(reopened), vec![5]);
}
