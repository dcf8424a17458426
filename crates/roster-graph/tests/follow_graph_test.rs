use roster_graph::alg::{self, ResolvedChain};
use roster_graph::{AddFollow, FollowGraph, Follower};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Person {
    id: u64,
    name: &'static str,
}

impl Follower for Person {
    fn follower_id(&self) -> u64 {
        self.id
    }
}

fn p(id: u64, name: &'static str) -> Person {
    Person { id, name }
}

#[test]
fn add_follow_rejects_self_and_second_followee() {
    let mut g: FollowGraph<Person> = FollowGraph::new();
    assert_eq!(g.add_follow(1, p(1, "a")), AddFollow::SelfFollow);
    assert_eq!(g.add_follow(1, p(2, "b")), AddFollow::Added);
    assert_eq!(g.add_follow(3, p(2, "b")), AddFollow::AlreadyFollowing(1));
    assert!(g.is_follower(2));
    assert_eq!(g.followee_of(2), Some(1));
    assert_eq!(g.followers(1).len(), 1);
    assert!(g.followers(3).is_empty());
}

#[test]
fn remove_followers_is_breadth_first_and_transitive() {
    let mut g: FollowGraph<Person> = FollowGraph::new();
    g.add_follow(1, p(2, "b"));
    g.add_follow(1, p(3, "c"));
    g.add_follow(2, p(4, "d"));
    g.add_follow(3, p(5, "e"));
    g.add_follow(7, p(8, "h"));

    let removed = g.remove_followers(1);
    let ids: Vec<u64> = removed.iter().map(|x| x.id).collect();
    assert_eq!(ids, vec![2, 3, 4, 5]);
    assert_eq!(g.followee_count(), 1);
    assert_eq!(g.follower_count(), 1);
    assert!(!g.is_follower(4));
}

#[test]
fn mutual_referrers_form_one_cycle() {
    let mut g: FollowGraph<Person> = FollowGraph::new();
    g.add_follow(10, p(11, "y"));
    g.add_follow(11, p(10, "x"));
    g.add_follow(11, p(12, "z"));

    let res = alg::resolve(&mut g);
    assert_eq!(res.cycles.len(), 1);
    assert_eq!(res.cycles[0].path, vec![10, 11]);
    let names: Vec<&str> = res.cycles[0].members.iter().map(|x| x.name).collect();
    assert_eq!(names, vec!["y", "x", "z"]);
    assert!(res.chains.is_empty());
    assert!(g.is_empty());
}

#[test]
fn chains_are_collapsed_under_their_root() {
    let mut g: FollowGraph<Person> = FollowGraph::new();
    // 2 follows 1, 3 follows 2, 4 follows 1; separate chain 20 <- 21.
    g.add_follow(2, p(3, "c"));
    g.add_follow(1, p(2, "b"));
    g.add_follow(20, p(21, "u"));
    g.add_follow(1, p(4, "d"));

    let res = alg::resolve(&mut g);
    assert!(res.cycles.is_empty());
    assert_eq!(
        res.chains,
        vec![
            ResolvedChain {
                root: 1,
                members: vec![p(2, "b"), p(3, "c"), p(4, "d")],
            },
            ResolvedChain {
                root: 20,
                members: vec![p(21, "u")],
            },
        ]
    );
    assert!(g.is_empty());
}

#[test]
fn cycles_are_stripped_before_chains() {
    let mut g: FollowGraph<u64> = FollowGraph::new();
    g.add_follow(1, 2);
    g.add_follow(5, 6);
    g.add_follow(6, 7);
    g.add_follow(7, 5);
    g.add_follow(2, 3);

    let res = alg::resolve(&mut g);
    assert_eq!(res.cycles.len(), 1);
    assert_eq!(res.cycles[0].path, vec![5, 6, 7]);
    assert_eq!(res.cycles[0].members.len(), 3);
    assert_eq!(res.chains.len(), 1);
    assert_eq!(res.chains[0].root, 1);
    assert_eq!(res.chains[0].members, vec![2, 3]);
}
