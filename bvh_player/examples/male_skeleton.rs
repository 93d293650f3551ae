//! Builds a male skeleton in code, binds one sample frame onto it, and
//! prints the resulting pose as an indented tree.

use bvh_formats::Skeleton;

const SAMPLE_FRAME: [f32; 69] = [
    -326.552, 98.7701, 317.634, 71.4085, 60.8487, 17.2406, -70.1915, 0.0, 88.8779, 84.6529,
    68.0632, -5.27801, 0.719492, 15.2067, 13.3733, -135.039, 24.774, 172.053, -171.896, 64.9682,
    -165.105, 3.6548, 1.03593, -36.4128, -55.7886, 37.8019, -120.338, 9.39682, 14.0503, -27.1815,
    4.41274, -0.125185, -1.52942, 1.33299, -4.20935, 46.1022, -92.5385, -35.676, 63.2656,
    -5.23096, -15.2195, 9.30354, 11.1114, -0.982512, -11.0421, -86.4319, -3.01435, 76.3394,
    1.71268, 24.9011, -2.42099, 9.483, 17.5267, -1.42749, -37.0021, -44.3019, -39.1702, -46.2538,
    -2.58689, 78.4703, 1.9216, 29.8211, -1.99744, -3.70506, 1.06523, 0.577189, 0.146783, 3.70013,
    2.9702,
];

fn main() {
    env_logger::init();

    let mut skeleton = Skeleton::default();
    let hips = skeleton.add_joint("Hips", None, 6, [0.0, 0.0, 0.0]);

    let to_spine = skeleton.add_joint("ToSpine", Some(hips), 3, [-2.69724, 7.43032, -0.144315]);
    let spine = skeleton.add_joint("Spine", Some(to_spine), 3, [-0.0310711, 10.7595, 1.96963]);
    let spine1 = skeleton.add_joint("Spine1", Some(spine), 3, [19.9056, 3.91189, 0.764692]);

    let neck = skeleton.add_joint("Neck", Some(spine1), 3, [25.9749, 7.03908, -0.130764]);
    let head = skeleton.add_joint("Head", Some(neck), 3, [9.52751, 0.295786, -0.907742]);
    skeleton.add_joint("Top", Some(head), 3, [16.4037, 0.713936, 2.7358]);

    let left_shoulder =
        skeleton.add_joint("LeftShoulder", Some(spine1), 3, [17.7449, 4.33886, 11.7777]);
    let left_arm = skeleton.add_joint("LeftArm", Some(left_shoulder), 3, [0.911315, 1.27913, 9.80584]);
    let left_fore_arm =
        skeleton.add_joint("LeftForeArm", Some(left_arm), 3, [28.61265, 1.18197, -3.53199]);
    let left_hand =
        skeleton.add_joint("LeftHand", Some(left_fore_arm), 3, [27.5088, 0.0218783, 0.327423]);
    skeleton.add_joint("EndLHand", Some(left_hand), 3, [18.6038, -0.000155887, 0.382096]);

    let r_shoulder = skeleton.add_joint("RShoulder", Some(spine1), 3, [17.1009, 2.89543, -12.2328]);
    let r_arm = skeleton.add_joint("RArm", Some(r_shoulder), 3, [1.4228, 0.178766, -10.211]);
    let r_fore_arm = skeleton.add_joint("RForeArm", Some(r_arm), 3, [28.733, 1.87905, 2.64907]);
    let r_hand = skeleton.add_joint("RHand", Some(r_fore_arm), 3, [27.4588, 0.290562, -0.101845]);
    skeleton.add_joint("RLHand", Some(r_hand), 3, [17.8396, -0.255518, -0.000602873]);

    let l_up_leg = skeleton.add_joint("LUpLeg", Some(hips), 3, [-5.61296, -2.22332, -10.2353]);
    let l_leg = skeleton.add_joint("LLeg", Some(l_up_leg), 3, [2.56703, -44.7417, -7.93097]);
    let l_foot = skeleton.add_joint("LFoot", Some(l_leg), 3, [3.16933, -46.5642, -3.96578]);
    let l_toe = skeleton.add_joint("LToe", Some(l_foot), 3, [0.346054, -6.02161, 12.8035]);
    skeleton.add_joint("LToe2", Some(l_toe), 3, [0.134235, -1.35082, 5.13018]);

    let r_up_leg = skeleton.add_joint("RUpLeg", Some(hips), 3, [-5.7928, -1.72406, 10.6446]);
    let r_leg = skeleton.add_joint("RLeg", Some(r_up_leg), 3, [-2.57161, -44.7178, -7.85259]);
    let r_foot = skeleton.add_joint("RFoot", Some(r_leg), 3, [-3.10148, -46.5936, -4.03391]);
    let r_toe = skeleton.add_joint("RToe", Some(r_foot), 3, [-0.0828122, -6.13587, 12.8035]);
    skeleton.add_joint("RToe2", Some(r_toe), 3, [-0.131328, -1.35082, 5.13018]);

    skeleton.apply_row(&SAMPLE_FRAME);

    println!(
        "{} joints, {} channels declared",
        skeleton.joints.len(),
        skeleton.channel_count()
    );
    print_joint(&skeleton, 0, 0);
}

fn print_joint(skeleton: &Skeleton, index: usize, depth: usize) {
    let joint = &skeleton.joints[index];
    let values = joint
        .channel_values
        .iter()
        .map(|value| format!("{value:.3}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{:indent$}{} [{values}]", "", joint.name, indent = depth * 2);
    for &child in &joint.children {
        print_joint(skeleton, child, depth + 1);
    }
}
