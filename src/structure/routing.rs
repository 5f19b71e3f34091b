//! Channel routing graph
//!
//! A borrowed view over every channel in a [`Structure`], indexed by id. The
//! edges are each channel's `destination` followed by its sends. Nothing here
//! owns a channel: the graph is rebuilt from the ownership forest whenever it
//! is needed, so it always reflects the current field values.

use std::collections::HashMap;

use super::Structure;
use crate::error::{DawProjectError, Result};
use crate::model::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Id-indexed view of the channels in a structure.
#[derive(Debug)]
pub struct RoutingGraph<'a> {
    channels: Vec<&'a Channel>,
    index: HashMap<&'a str, usize>,
}

impl<'a> RoutingGraph<'a> {
    pub fn new(structure: &'a Structure) -> Self {
        let channels: Vec<&Channel> = structure.tracks().map(|t| &t.channel).collect();
        let mut index = HashMap::with_capacity(channels.len());
        for (i, channel) in channels.iter().enumerate() {
            index.entry(channel.id.as_str()).or_insert(i);
        }
        Self { channels, index }
    }

    pub fn channel(&self, id: &str) -> Option<&'a Channel> {
        self.index.get(id).map(|&i| self.channels[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Channels whose main output is `id`, in structure order.
    pub fn routing_to(&self, id: &str) -> Vec<&'a Channel> {
        self.channels
            .iter()
            .copied()
            .filter(|c| c.destination.as_deref() == Some(id))
            .collect()
    }

    /// First cycle found, as channel ids with the repeated id at both ends.
    ///
    /// Edges pointing at unknown ids are skipped; resolving them is the
    /// validation gate's job.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.channels.len()];
        for start in 0..self.channels.len() {
            if marks[start] != Mark::Unvisited || self.channels[start].outputs().next().is_none() {
                continue;
            }
            if let Some(cycle) = self.visit(start, &mut marks) {
                return Some(cycle);
            }
        }
        None
    }

    pub fn check_acyclic(&self) -> Result<()> {
        match self.find_cycle() {
            Some(path) => Err(DawProjectError::RoutingCycle { path }),
            None => Ok(()),
        }
    }

    /// Depth-first walk from `start`. The stack holds the current path, each
    /// node paired with the outputs it has not followed yet.
    fn visit(&self, start: usize, marks: &mut [Mark]) -> Option<Vec<String>> {
        marks[start] = Mark::Visiting;
        let mut stack = vec![(start, self.channels[start].outputs())];
        while let Some((node, outputs)) = stack.last_mut() {
            let node = *node;
            let Some(target) = outputs.next() else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            let Some(&next) = self.index.get(target) else {
                continue;
            };
            match marks[next] {
                Mark::Visiting => {
                    let begin = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                    let mut cycle: Vec<String> = stack[begin..]
                        .iter()
                        .map(|(n, _)| self.channels[*n].id.clone())
                        .collect();
                    cycle.push(self.channels[next].id.clone());
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    marks[next] = Mark::Visiting;
                    stack.push((next, self.channels[next].outputs()));
                }
                Mark::Done => {}
            }
        }
        None
    }
}
