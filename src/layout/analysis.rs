//! The clustering passes: characters to lines, lines to boxes, boxes to
//! reading-order groups.

use std::collections::HashMap;

use crate::geometry::Bounds;
use crate::layout::plane::Plane;
use crate::layout::{
    Char, Dir, GroupKind, GroupNode, LAParams, LayoutItem, TextBox, TextLine,
};
use crate::utils::safe_float_cmp;

/// Analyze the contents of one container (page or figure).
///
/// Returns the new item list (text boxes in reading order, then the
/// non-text items, then whitespace-only lines) and the group tree.
pub(crate) fn analyze_container(
    items: Vec<LayoutItem>,
    laparams: &LAParams,
) -> (Vec<LayoutItem>, Vec<GroupNode>) {
    let mut chars = Vec::new();
    let mut others = Vec::new();
    for item in items {
        match item {
            LayoutItem::Char(c) => chars.push(c),
            LayoutItem::Figure(mut figure) => {
                figure.analyze(laparams);
                others.push(LayoutItem::Figure(figure));
            },
            other => others.push(other),
        }
    }
    if chars.is_empty() {
        return (others, Vec::new());
    }

    let lines = get_textlines(laparams, chars);
    let mut empties = Vec::new();
    let mut full_lines = Vec::new();
    for mut line in lines {
        if line.is_empty() {
            line.analyze(laparams);
            empties.push(line);
        } else {
            full_lines.push(line);
        }
    }

    let boxes = get_textboxes(laparams, full_lines);
    let (boxes, groups) = group_textboxes(laparams, boxes);

    let mut out: Vec<LayoutItem> = boxes.into_iter().map(LayoutItem::TextBox).collect();
    out.extend(others);
    out.extend(empties.into_iter().map(LayoutItem::TextLine));
    (out, groups)
}

/// Stage 1: coalesce characters into lines.
///
/// Characters are scanned pairwise in emission order. A pair continues a
/// horizontal line when it overlaps vertically by more than
/// `line_overlap` of the smaller height and sits within `char_margin`
/// widths; the vertical test is symmetric and only active with
/// `detect_vertical`. When both directions match, whichever matches the
/// open line wins.
fn get_textlines(laparams: &LAParams, chars: Vec<Char>) -> Vec<TextLine> {
    let mut out = Vec::new();
    if chars.is_empty() {
        return out;
    }
    let mut line: Option<TextLine> = None;
    let last = chars.len() - 1;
    for i in 1..chars.len() {
        let (obj0, obj1) = (&chars[i - 1], &chars[i]);
        let mut k = 0u8;
        if obj0.bbox.is_voverlap(&obj1.bbox)
            && obj0.bbox.height().min(obj1.bbox.height()) * laparams.line_overlap
                < obj0.bbox.voverlap(&obj1.bbox)
            && obj0.bbox.hdistance(&obj1.bbox)
                < obj0.bbox.width().max(obj1.bbox.width()) * laparams.char_margin
        {
            // obj0 and obj1 are horizontally aligned:
            //
            //   +------+ - - -
            //   | obj0 | - - +------+   -
            //   |      |     | obj1 |   | (line_overlap)
            //   +------+ - - |      |   -
            //          - - - +------+
            //          |<--->|
            //        (char_margin)
            k |= 1;
        }
        if laparams.detect_vertical
            && obj0.bbox.is_hoverlap(&obj1.bbox)
            && obj0.bbox.width().min(obj1.bbox.width()) * laparams.line_overlap
                < obj0.bbox.hoverlap(&obj1.bbox)
            && obj0.bbox.vdistance(&obj1.bbox)
                < obj0.bbox.height().max(obj1.bbox.height()) * laparams.char_margin
        {
            // obj0 sits above obj1 within the same column.
            k |= 2;
        }
        let continues = match &line {
            Some(l) => (k & 1 != 0 && l.dir == Dir::Horizontal)
                || (k & 2 != 0 && l.dir == Dir::Vertical),
            None => false,
        };
        if continues {
            line.as_mut().expect("checked above").add(obj1.clone());
        } else if let Some(done) = line.take() {
            out.push(done);
        } else if k == 2 {
            let mut l = TextLine::new(Dir::Vertical);
            l.add(obj0.clone());
            l.add(obj1.clone());
            line = Some(l);
        } else if k == 1 {
            let mut l = TextLine::new(Dir::Horizontal);
            l.add(obj0.clone());
            l.add(obj1.clone());
            line = Some(l);
        } else {
            let mut l = TextLine::new(Dir::Horizontal);
            l.add(obj0.clone());
            out.push(l);
        }
    }
    match line {
        Some(l) => out.push(l),
        None => {
            let mut l = TextLine::new(Dir::Horizontal);
            l.add(chars[last].clone());
            out.push(l);
        },
    }
    out
}

/// Stage 2: group lines into text boxes through the spatial index.
///
/// Each line queries the plane for neighbors within `line_margin` of its
/// height (width for vertical lines); mutually-found lines with close
/// median character heights coalesce into one box. Paragraph splitting
/// runs here when requested.
fn get_textboxes(laparams: &LAParams, lines: Vec<TextLine>) -> Vec<TextBox> {
    if lines.is_empty() {
        return Vec::new();
    }
    let mut plane = Plane::default();
    for (i, line) in lines.iter().enumerate() {
        plane.add(i, line.bbox);
    }

    let mut components = DisjointSets::new(lines.len());
    for (i, line) in lines.iter().enumerate() {
        for j in find_neighbors(laparams, &plane, &lines, i, line) {
            components.union(i, j);
        }
    }

    // Boxes come out in order of their first line.
    let mut box_of_root: HashMap<usize, usize> = HashMap::new();
    let mut boxes: Vec<TextBox> = Vec::new();
    for (i, line) in lines.into_iter().enumerate() {
        let root = components.find(i);
        let slot = *box_of_root.entry(root).or_insert_with(|| {
            boxes.push(TextBox::new(line.dir));
            boxes.len() - 1
        });
        boxes[slot].add(line);
    }

    match laparams.paragraph_indent {
        Some(indent) => boxes
            .into_iter()
            .flat_map(|b| {
                if b.dir == Dir::Horizontal {
                    b.paragraphs(indent)
                } else {
                    vec![b]
                }
            })
            .collect(),
        None => boxes,
    }
}

fn find_neighbors(
    laparams: &LAParams,
    plane: &Plane<usize>,
    lines: &[TextLine],
    index: usize,
    line: &TextLine,
) -> Vec<usize> {
    match line.dir {
        Dir::Horizontal => {
            let d = laparams.line_margin * line.bbox.height();
            let area = Bounds::new(line.bbox.x0, line.bbox.y0 - d, line.bbox.x1, line.bbox.y1 + d);
            let own_median = line.median_charheight();
            plane
                .find(&area)
                .into_iter()
                .filter(|&j| {
                    j == index
                        || (lines[j].dir == Dir::Horizontal
                            && (lines[j].median_charheight() - own_median).abs()
                                < laparams.line_margin)
                })
                .collect()
        },
        Dir::Vertical => {
            let d = laparams.line_margin * line.bbox.width();
            let area = Bounds::new(line.bbox.x0 - d, line.bbox.y0, line.bbox.x1 + d, line.bbox.y1);
            plane
                .find(&area)
                .into_iter()
                .filter(|&j| lines[j].dir == Dir::Vertical)
                .collect()
        },
    }
}

/// Plain union-find over line indices.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the smaller root so components stay anchored at their
            // earliest line.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// An element alive during grouping: a box or an already-built group.
enum GMember {
    Box(TextBox),
    Group(GroupTmp),
}

struct GroupTmp {
    kind: GroupKind,
    bbox: Bounds,
    children: Vec<GMember>,
}

impl GMember {
    fn bbox(&self) -> Bounds {
        match self {
            GMember::Box(b) => b.bbox,
            GMember::Group(g) => g.bbox,
        }
    }

    fn flows_vertically(&self) -> bool {
        match self {
            GMember::Box(b) => b.dir == Dir::Vertical,
            GMember::Group(g) => g.kind == GroupKind::Tbrl,
        }
    }

    fn analyze(&mut self, laparams: &LAParams) {
        match self {
            GMember::Box(b) => b.analyze(laparams),
            GMember::Group(g) => {
                for child in &mut g.children {
                    child.analyze(laparams);
                }
                let flow = laparams.boxes_flow;
                let key = |m: &GMember| {
                    let b = m.bbox();
                    match g.kind {
                        GroupKind::Lrtb => (1.0 - flow) * b.x0 - (1.0 + flow) * (b.y0 + b.y1),
                        GroupKind::Tbrl => {
                            -(1.0 + flow) * (b.x0 + b.x1) - (1.0 - flow) * b.y1
                        },
                    }
                };
                g.children.sort_by(|a, b| safe_float_cmp(key(a), key(b)));
            },
        }
    }
}

/// The bounding-rectangle "wasted area" distance between two boxes.
///
/// Area of the union rectangle less the areas of the two boxes; may be
/// negative for overlapping boxes.
fn dist(b1: &Bounds, b2: &Bounds) -> f32 {
    let u = b1.union(b2);
    u.width() * u.height() - b1.width() * b1.height() - b2.width() * b2.height()
}

/// Stage 4: greedy agglomerative pairing into a reading-order tree.
///
/// The closest pair merges first; a pair whose union rectangle has some
/// other live element intruding into it is deferred (re-queued with a
/// later tie-break class) so spatially clean merges happen before
/// straddling ones. Grouping is skipped entirely above 100 boxes.
fn group_textboxes(
    laparams: &LAParams,
    boxes: Vec<TextBox>,
) -> (Vec<TextBox>, Vec<GroupNode>) {
    if boxes.len() > 100 {
        log::warn!("too many boxes ({}) to group, skipping", boxes.len());
        let mut out = boxes;
        for (i, b) in out.iter_mut().enumerate() {
            b.analyze(laparams);
            b.index = Some(i);
        }
        let groups = (0..out.len()).map(GroupNode::Boxed).collect();
        return (out, groups);
    }

    let mut slab: HashMap<usize, GMember> = HashMap::new();
    let mut plane = Plane::default();
    for (i, b) in boxes.into_iter().enumerate() {
        plane.add(i, b.bbox);
        slab.insert(i, GMember::Box(b));
    }
    let mut next_id = slab.len();

    let mut dists: Vec<(u8, f32, usize, usize)> = Vec::new();
    let ids: Vec<usize> = (0..next_id).collect();
    for (a, &i) in ids.iter().enumerate() {
        for &j in &ids[a + 1..] {
            dists.push((0, dist(&slab[&i].bbox(), &slab[&j].bbox()), i, j));
        }
    }
    let sort_key = |x: &(u8, f32, usize, usize), y: &(u8, f32, usize, usize)| {
        x.0.cmp(&y.0).then_with(|| safe_float_cmp(x.1, y.1))
    };
    dists.sort_by(sort_key);

    while !dists.is_empty() {
        let (c, d, i, j) = dists.remove(0);
        let union = slab[&i].bbox().union(&slab[&j].bbox());
        if c == 0 {
            let intruder = plane
                .find(&union)
                .into_iter()
                .any(|k| k != i && k != j);
            if intruder {
                dists.push((1, d, i, j));
                continue;
            }
        }
        let mi = slab.remove(&i).expect("live member");
        let mj = slab.remove(&j).expect("live member");
        let kind = if mi.flows_vertically() || mj.flows_vertically() {
            GroupKind::Tbrl
        } else {
            GroupKind::Lrtb
        };
        let group = GroupTmp {
            kind,
            bbox: union,
            children: vec![mi, mj],
        };
        plane.remove(&i);
        plane.remove(&j);
        dists.retain(|(_, _, a, b)| plane.contains(a) && plane.contains(b));
        let gid = next_id;
        next_id += 1;
        for other in plane.iter().collect::<Vec<_>>() {
            dists.push((0, dist(&union, &slab[&other].bbox()), gid, other));
        }
        dists.sort_by(sort_key);
        plane.add(gid, union);
        slab.insert(gid, GMember::Group(group));
    }

    let mut final_boxes = Vec::new();
    let mut nodes = Vec::new();
    let remaining: Vec<usize> = plane.iter().collect();
    for id in remaining {
        let mut member = slab.remove(&id).expect("live member");
        member.analyze(laparams);
        nodes.push(flatten(member, &mut final_boxes));
    }
    (final_boxes, nodes)
}

/// Walk the grouping tree in reading order, assigning indices and moving
/// the boxes out.
fn flatten(member: GMember, boxes: &mut Vec<TextBox>) -> GroupNode {
    match member {
        GMember::Box(mut b) => {
            let index = boxes.len();
            b.index = Some(index);
            boxes.push(b);
            GroupNode::Boxed(index)
        },
        GMember::Group(g) => GroupNode::Group {
            kind: g.kind,
            bbox: g.bbox,
            children: g.children.into_iter().map(|c| flatten(c, boxes)).collect(),
        },
    }
}
